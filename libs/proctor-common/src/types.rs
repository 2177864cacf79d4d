use crate::files::FileMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum number of files per challenge or step
pub const MAX_FILES: usize = 5;

/// Languages the engine can grade.
///
/// A closed set: adding or removing a variant is a compile-time change at
/// every dispatch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    /// Embedded script language, executed directly
    Rhai,
    /// Markup, evaluated through a parsed document tree
    Html,
    /// Style sheets, evaluated through computed styles on a fixture
    Css,
    /// Dynamic language, executed by an out-of-process interpreter
    Python,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Rhai,
        Language::Html,
        Language::Css,
        Language::Python,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Language::Rhai => "rhai",
            Language::Html => "html",
            Language::Css => "css",
            Language::Python => "python",
        }
    }

    /// Lowercase file extensions (with the dot) that belong to this language
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Rhai => &[".rhai"],
            Language::Html => &[".html", ".htm"],
            Language::Css => &[".css"],
            Language::Python => &[".py"],
        }
    }

    pub fn default_filename(&self) -> &'static str {
        match self {
            Language::Rhai => "app.rhai",
            Language::Html => "index.html",
            Language::Css => "styles.css",
            Language::Python => "app.py",
        }
    }

    pub fn starter_code(&self) -> &'static str {
        match self {
            Language::Rhai => {
                "// Do not rename this function\n\
                 fn solution(input) {\n    \
                     // Your code here\n\
                 }\n\
                 \n\
                 exports.solution = Fn(\"solution\");\n"
            }
            Language::Html => {
                "<!DOCTYPE html>\n\
                 <html lang=\"en\">\n  \
                   <head>\n    \
                     <meta charset=\"UTF-8\">\n    \
                     <title>Document</title>\n  \
                   </head>\n  \
                   <body>\n\n  \
                   </body>\n\
                 </html>\n"
            }
            Language::Css => "/* Write your CSS here */\n\n",
            Language::Python => "def solution(params):\n    # Your code here\n    pass\n",
        }
    }

    /// Lines of starter code the student may not edit
    pub fn default_locked_lines(&self) -> usize {
        match self {
            Language::Rhai => 2,
            _ => 0,
        }
    }

    /// Infer a language from a filename's extension
    pub fn from_filename(name: &str) -> Option<Language> {
        let lowered = name.to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.extensions().iter().any(|ext| lowered.ends_with(ext)))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLanguage(pub String);

impl fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown language: {}", self.0)
    }
}

impl std::error::Error for UnknownLanguage {}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rhai" | "script" => Ok(Language::Rhai),
            "html" | "htm" | "markup" => Ok(Language::Html),
            "css" | "style" => Ok(Language::Css),
            "python" | "py" | "dynamic" => Ok(Language::Python),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

impl TryFrom<String> for Language {
    type Error = UnknownLanguage;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.key().to_string()
    }
}

/// A template file owned by a challenge or step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub name: String,
    pub language: Language,
    pub code: String,
    #[serde(default)]
    pub locked_lines: usize,
}

impl File {
    /// Default starter file for a language
    pub fn default_for(language: Language) -> Self {
        Self {
            name: language.default_filename().to_string(),
            language,
            code: language.starter_code().to_string(),
            locked_lines: language.default_locked_lines(),
        }
    }

    /// The first `locked_lines` lines of the template
    pub fn locked_prefix(&self) -> Vec<&str> {
        self.code.lines().take(self.locked_lines).collect()
    }

    /// Restore the locked prefix on a student's edited copy of this file
    pub fn enforce_locked_lines(&self, submitted: &str) -> String {
        if self.locked_lines == 0 {
            return submitted.to_string();
        }

        let locked = self.locked_prefix();
        let skip = locked.len();
        let mut merged = locked
            .into_iter()
            .chain(submitted.lines().skip(skip))
            .collect::<Vec<_>>()
            .join("\n");
        if submitted.ends_with('\n') || (submitted.is_empty() && self.code.ends_with('\n')) {
            merged.push('\n');
        }
        merged
    }
}

/// An assertion-based test. Order within a challenge is execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub assertion: String,
    #[serde(default)]
    pub failure_message: String,
}

impl Test {
    pub fn new(id: impl Into<String>, assertion: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            assertion: assertion.into(),
            failure_message: String::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn on_failure(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }
}

/// Outcome of a single test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub description: String,
    pub passed: bool,
    pub message: Option<String>,
}

/// Structured result of grading one submission.
///
/// `error` is only set when no test could run; in that case `results` is
/// empty. A successful outcome carries one passing result per test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub results: Vec<TestResult>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn passed(results: Vec<TestResult>) -> Self {
        Self {
            success: true,
            results,
            error: None,
        }
    }

    pub fn failed(results: Vec<TestResult>) -> Self {
        Self {
            success: false,
            results,
            error: None,
        }
    }

    /// A global error raised before any test ran
    pub fn load_error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn first_failure(&self) -> Option<&TestResult> {
        self.results.iter().find(|r| !r.passed)
    }
}

/// One submission to grade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub id: Uuid,
    pub language: Language,
    pub files: FileMap,
    pub tests: Vec<Test>,
}

impl ExecutionRequest {
    pub fn new(language: Language, files: FileMap, tests: Vec<Test>) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            files,
            tests,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A phase of a multi-step challenge with its own files and tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub tests: Vec<Test>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub language: Language,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub tests: Vec<Test>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Challenge {
    /// Authoring problems that would make grading ambiguous
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        check_unit(&self.title, &self.files, &self.tests, &mut problems);
        for (idx, step) in self.steps.iter().enumerate() {
            let label = format!("step {} ({})", idx + 1, step.title);
            check_unit(&label, &step.files, &step.tests, &mut problems);
        }
        problems
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("challenge '{}' is invalid: {}", self.id, problems.join("; "))
        }
    }

    /// Build a request for the challenge (or one of its steps), overlaying the
    /// student's edited files on the templates.
    ///
    /// Overrides for files the template does not declare are ignored.
    pub fn request_for(
        &self,
        step: Option<usize>,
        overrides: &FileMap,
    ) -> anyhow::Result<ExecutionRequest> {
        let (files, tests) = match step {
            None => (&self.files, &self.tests),
            Some(idx) => {
                let step = self.steps.get(idx).ok_or_else(|| {
                    anyhow::anyhow!(
                        "challenge '{}' has {} steps, no step {}",
                        self.id,
                        self.steps.len(),
                        idx + 1
                    )
                })?;
                (&step.files, &step.tests)
            }
        };

        let mut merged = FileMap::new();
        for template in files {
            let code = match overrides.get(&template.name) {
                Some(submitted) => template.enforce_locked_lines(submitted),
                None => template.code.clone(),
            };
            merged.insert(template.name.clone(), code);
        }
        for (name, _) in overrides.iter() {
            if !merged.contains(name) {
                tracing::warn!(file = name, challenge = %self.id, "Ignoring file not declared by the challenge");
            }
        }

        Ok(ExecutionRequest::new(self.language, merged, tests.clone()))
    }
}

fn check_unit(label: &str, files: &[File], tests: &[Test], problems: &mut Vec<String>) {
    if files.len() > MAX_FILES {
        problems.push(format!(
            "{}: {} files exceeds the limit of {}",
            label,
            files.len(),
            MAX_FILES
        ));
    }

    let mut names = HashSet::new();
    for file in files {
        if !names.insert(file.name.as_str()) {
            problems.push(format!("{}: duplicate file name '{}'", label, file.name));
        }
    }

    let mut ids = HashSet::new();
    for test in tests {
        if !ids.insert(test.id.as_str()) {
            problems.push(format!("{}: duplicate test id '{}'", label, test.id));
        }
        if test.assertion.trim().is_empty() {
            problems.push(format!("{}: test '{}' has an empty assertion", label, test.id));
        }
    }
}
