// The live host page style fixtures are attached to
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

struct Mount {
    id: Uuid,
    markup: String,
}

#[derive(Default)]
struct PageState {
    head: String,
    body: String,
    mounted: Vec<Mount>,
}

/// Host document shared by every request of an `Executor`.
///
/// Fixtures are appended to the end of `<body>` while a request runs and
/// removed by their `FixtureGuard`.
pub struct Page {
    state: Mutex<PageState>,
}

impl Page {
    pub fn new(head: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(PageState {
                head: head.into(),
                body: body.into(),
                mounted: Vec::new(),
            }),
        }
    }

    pub fn blank() -> Self {
        Self::new("", "")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `markup` to the body until the returned guard drops
    pub fn attach(&self, id: Uuid, markup: String) -> FixtureGuard<'_> {
        self.lock().mounted.push(Mount { id, markup });
        debug!(fixture_id = %id, "Fixture attached");
        FixtureGuard { page: self, id }
    }

    fn detach(&self, id: Uuid) -> bool {
        let mut state = self.lock();
        let before = state.mounted.len();
        state.mounted.retain(|mount| mount.id != id);
        state.mounted.len() != before
    }

    /// Serialized page, including attached fixtures
    pub fn snapshot(&self) -> String {
        let state = self.lock();
        let mut html = format!("<!DOCTYPE html><html><head>{}</head><body>{}", state.head, state.body);
        for mount in &state.mounted {
            html.push_str(&mount.markup);
        }
        html.push_str("</body></html>");
        html
    }

    pub fn mounted_count(&self) -> usize {
        self.lock().mounted.len()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::blank()
    }
}

/// Keeps a fixture attached; detaches it on drop, including during unwinding
pub struct FixtureGuard<'p> {
    page: &'p Page,
    id: Uuid,
}

impl FixtureGuard<'_> {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for FixtureGuard<'_> {
    fn drop(&mut self) {
        if self.page.detach(self.id) {
            debug!(fixture_id = %self.id, "Fixture detached");
        } else {
            warn!(fixture_id = %self.id, "Fixture was already detached");
        }
    }
}
