/// Read-Only DOM Bindings for Assertions
///
/// **Core Responsibility:**
/// Expose a parsed HTML document to Rhai assertions through `Document` and
/// `Element` handles shaped after the browser DOM (`querySelector`,
/// `textContent`, `parentElement`, ...).
///
/// **Properties:**
/// - Handles are read-only; no assertion can change the document
/// - Absent results (`querySelector` misses, `getAttribute` on a missing
///   attribute, `parentElement` of the root) are `()`
/// - Invalid selectors raise `SyntaxError`
/// - Elements are addressed by their preorder position, so two handles to
///   the same node compare equal
use crate::css::{camel_case, compute_styles, ComputedStyle, StyleEnv};
use crate::error::{SYNTAX_ERROR, TYPE_ERROR};
use crate::sandbox::raise;
use ego_tree::NodeId;
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::rc::Rc;

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

/// A parsed document, optionally with computed styles per element
pub struct DomDocument {
    html: Html,
    styles: Vec<ComputedStyle>,
    /// Element node ids in preorder, indexed by ordinal
    order: Vec<NodeId>,
    ordinals: HashMap<NodeId, usize>,
}

impl DomDocument {
    pub fn parse(markup: &str) -> Rc<Self> {
        Rc::new(Self::index(Html::parse_document(markup), Vec::new()))
    }

    /// Parse and resolve the cascade for every element
    pub fn parse_styled(markup: &str, env: StyleEnv) -> Rc<Self> {
        let html = Html::parse_document(markup);
        let styles = compute_styles(&html, env);
        Rc::new(Self::index(html, styles))
    }

    fn index(html: Html, styles: Vec<ComputedStyle>) -> Self {
        let order: Vec<NodeId> = html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|el| el.id())
            .collect();
        let ordinals = order.iter().enumerate().map(|(ordinal, id)| (*id, ordinal)).collect();
        Self {
            html,
            styles,
            order,
            ordinals,
        }
    }

    pub fn element_count(&self) -> usize {
        self.order.len()
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.order
            .iter()
            .filter_map(|id| self.html.tree.get(*id))
            .filter_map(ElementRef::wrap)
    }

    fn element(&self, ordinal: usize) -> Option<ElementRef<'_>> {
        let id = *self.order.get(ordinal)?;
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    fn ordinal_of(&self, element: &ElementRef) -> Option<usize> {
        self.ordinals.get(&element.id()).copied()
    }

    fn handle(self: &Rc<Self>, ordinal: usize) -> ElementHandle {
        ElementHandle {
            doc: Rc::clone(self),
            ordinal,
        }
    }

    fn handle_for(self: &Rc<Self>, element: &ElementRef) -> Option<ElementHandle> {
        self.ordinal_of(element).map(|ordinal| self.handle(ordinal))
    }

    /// First element carrying `name="value"`
    pub fn find_by_attribute(self: &Rc<Self>, name: &str, value: &str) -> Option<ElementHandle> {
        self.elements()
            .position(|el| el.value().attr(name) == Some(value))
            .map(|ordinal| self.handle(ordinal))
    }

    /// Elements matching `selector`, in document order.
    ///
    /// With a `scope`, only proper descendants of that element are returned.
    fn select(self: &Rc<Self>, scope: Option<usize>, selector: &str) -> RhaiResult<Vec<ElementHandle>> {
        let selector = parse_selector(selector)?;
        let scope = scope.and_then(|ordinal| self.element(ordinal));

        Ok(self
            .elements()
            .enumerate()
            .filter(|(_, el)| selector.matches(el))
            .filter(|(_, el)| match &scope {
                Some(scope) => el.ancestors().any(|a| a.id() == scope.id()),
                None => true,
            })
            .map(|(ordinal, _)| self.handle(ordinal))
            .collect())
    }

    fn select_where<F>(self: &Rc<Self>, predicate: F) -> Vec<ElementHandle>
    where
        F: Fn(&ElementRef) -> bool,
    {
        self.elements()
            .enumerate()
            .filter(|(_, el)| predicate(el))
            .map(|(ordinal, _)| self.handle(ordinal))
            .collect()
    }

    fn first_named(self: &Rc<Self>, tag: &str) -> Option<ElementHandle> {
        self.elements()
            .position(|el| el.value().name() == tag)
            .map(|ordinal| self.handle(ordinal))
    }
}

fn parse_selector(selector: &str) -> RhaiResult<Selector> {
    Selector::parse(selector).map_err(|err| {
        raise(
            SYNTAX_ERROR,
            format!("'{}' is not a valid selector: {}", selector, err),
        )
    })
}

fn optional(handle: Option<ElementHandle>) -> Dynamic {
    handle.map(Dynamic::from).unwrap_or(Dynamic::UNIT)
}

fn array(handles: Vec<ElementHandle>) -> Array {
    handles.into_iter().map(Dynamic::from).collect()
}

/// `document` binding
#[derive(Clone)]
pub struct DocumentHandle {
    doc: Rc<DomDocument>,
}

impl DocumentHandle {
    pub fn new(doc: Rc<DomDocument>) -> Self {
        Self { doc }
    }

    fn query_selector(&mut self, selector: &str) -> RhaiResult<Dynamic> {
        Ok(optional(self.doc.select(None, selector)?.into_iter().next()))
    }

    fn query_selector_all(&mut self, selector: &str) -> RhaiResult<Array> {
        Ok(array(self.doc.select(None, selector)?))
    }

    fn get_element_by_id(&mut self, id: &str) -> Dynamic {
        optional(
            self.doc
                .select_where(|el| el.value().id() == Some(id))
                .into_iter()
                .next(),
        )
    }

    fn get_elements_by_tag_name(&mut self, tag: &str) -> Array {
        array(
            self.doc
                .select_where(|el| tag == "*" || el.value().name().eq_ignore_ascii_case(tag)),
        )
    }

    fn get_elements_by_class_name(&mut self, names: &str) -> Array {
        let wanted: Vec<&str> = names.split_whitespace().collect();
        if wanted.is_empty() {
            return Array::new();
        }
        array(self.doc.select_where(|el| {
            wanted
                .iter()
                .all(|name| el.value().classes().any(|class| class == *name))
        }))
    }

    fn title(&mut self) -> String {
        self.doc
            .elements()
            .find(|el| el.value().name() == "title")
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    fn body(&mut self) -> Dynamic {
        optional(self.doc.first_named("body"))
    }

    fn head(&mut self) -> Dynamic {
        optional(self.doc.first_named("head"))
    }

    fn document_element(&mut self) -> Dynamic {
        optional(Some(self.doc.handle(0)))
    }
}

/// An element of a `DomDocument`
#[derive(Clone)]
pub struct ElementHandle {
    doc: Rc<DomDocument>,
    ordinal: usize,
}

impl ElementHandle {
    fn with<R: Default>(&self, f: impl FnOnce(ElementRef) -> R) -> R {
        self.doc.element(self.ordinal).map(f).unwrap_or_default()
    }

    fn related<F>(&self, f: F) -> Dynamic
    where
        F: FnOnce(ElementRef) -> Option<ElementRef>,
    {
        let related = self
            .doc
            .element(self.ordinal)
            .and_then(f)
            .and_then(|el| self.doc.handle_for(&el));
        optional(related)
    }

    pub fn same(&self, other: &ElementHandle) -> bool {
        Rc::ptr_eq(&self.doc, &other.doc) && self.ordinal == other.ordinal
    }

    pub fn computed_style(&self) -> Option<&ComputedStyle> {
        self.doc.styles.get(self.ordinal)
    }

    pub fn tag_name(&mut self) -> String {
        self.with(|el| el.value().name().to_ascii_uppercase())
    }

    fn id(&mut self) -> String {
        self.with(|el| el.value().id().unwrap_or_default().to_string())
    }

    fn class_name(&mut self) -> String {
        self.with(|el| el.value().attr("class").unwrap_or_default().to_string())
    }

    fn class_list(&mut self) -> Array {
        self.with(|el| el.value().classes().map(|class| Dynamic::from(class.to_string())).collect())
    }

    fn text_content(&mut self) -> String {
        self.with(|el| el.text().collect())
    }

    fn inner_html(&mut self) -> String {
        self.with(|el| el.inner_html())
    }

    fn outer_html(&mut self) -> String {
        self.with(|el| el.html())
    }

    fn attributes(&mut self) -> Map {
        self.with(|el| {
            el.value()
                .attrs()
                .map(|(name, value)| (name.into(), Dynamic::from(value.to_string())))
                .collect()
        })
    }

    fn children(&mut self) -> Array {
        let doc = Rc::clone(&self.doc);
        self.with(|el| {
            el.children()
                .filter_map(ElementRef::wrap)
                .filter_map(|child| doc.handle_for(&child))
                .map(Dynamic::from)
                .collect()
        })
    }

    fn child_element_count(&mut self) -> i64 {
        self.with(|el| el.children().filter_map(ElementRef::wrap).count() as i64)
    }

    fn parent_element(&mut self) -> Dynamic {
        self.related(|el| el.parent().and_then(ElementRef::wrap))
    }

    fn first_element_child(&mut self) -> Dynamic {
        self.related(|el| el.children().find_map(ElementRef::wrap))
    }

    fn last_element_child(&mut self) -> Dynamic {
        self.related(|el| el.children().filter_map(ElementRef::wrap).last())
    }

    fn next_element_sibling(&mut self) -> Dynamic {
        self.related(|el| el.next_siblings().find_map(ElementRef::wrap))
    }

    fn previous_element_sibling(&mut self) -> Dynamic {
        self.related(|el| el.prev_siblings().find_map(ElementRef::wrap))
    }

    fn get_attribute(&mut self, name: &str) -> Dynamic {
        let name = name.to_ascii_lowercase();
        self.with(|el| {
            el.value()
                .attr(&name)
                .map(|value| Dynamic::from(value.to_string()))
                .unwrap_or(Dynamic::UNIT)
        })
    }

    fn has_attribute(&mut self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.with(|el| el.value().attr(&name).is_some())
    }

    fn query_selector(&mut self, selector: &str) -> RhaiResult<Dynamic> {
        Ok(optional(self.doc.select(Some(self.ordinal), selector)?.into_iter().next()))
    }

    fn query_selector_all(&mut self, selector: &str) -> RhaiResult<Array> {
        Ok(array(self.doc.select(Some(self.ordinal), selector)?))
    }

    fn matches(&mut self, selector: &str) -> RhaiResult<bool> {
        let selector = parse_selector(selector)?;
        Ok(self.with(|el| selector.matches(&el)))
    }

    fn closest(&mut self, selector: &str) -> RhaiResult<Dynamic> {
        let selector = parse_selector(selector)?;
        Ok(self.related(|el| {
            std::iter::once(el)
                .chain(el.ancestors().filter_map(ElementRef::wrap))
                .find(|candidate| selector.matches(candidate))
        }))
    }

    fn contains(&mut self, other: ElementHandle) -> bool {
        if !Rc::ptr_eq(&self.doc, &other.doc) {
            return false;
        }
        let Some(this) = self.doc.element(self.ordinal) else {
            return false;
        };
        other.with(|el| el.id() == this.id() || el.ancestors().any(|a| a.id() == this.id()))
    }

    fn describe(&mut self) -> String {
        self.with(|el| {
            let mut label = el.value().name().to_string();
            if let Some(id) = el.value().id() {
                label.push('#');
                label.push_str(id);
            }
            for class in el.value().classes() {
                label.push('.');
                label.push_str(class);
            }
            format!("<{}>", label)
        })
    }

    /// Computed style as an object map with kebab-case and camelCase keys
    fn computed_style_map(&mut self) -> RhaiResult<Map> {
        let Some(style) = self.computed_style() else {
            return Err(raise(
                TYPE_ERROR,
                "getComputedStyle is only available for rendered fixtures",
            ));
        };

        let mut map = Map::new();
        for (property, value) in style.iter() {
            let camel = camel_case(property);
            let value = Dynamic::from(value.to_string());
            if camel != property {
                map.insert(camel.into(), value.clone());
            }
            map.insert(property.into(), value);
        }
        Ok(map)
    }
}

/// Register `Document` and `Element` with an engine
pub fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<DocumentHandle>("Document")
        .register_fn("querySelector", DocumentHandle::query_selector)
        .register_fn("querySelectorAll", DocumentHandle::query_selector_all)
        .register_fn("getElementById", DocumentHandle::get_element_by_id)
        .register_fn("getElementsByTagName", DocumentHandle::get_elements_by_tag_name)
        .register_fn("getElementsByClassName", DocumentHandle::get_elements_by_class_name)
        .register_get("title", DocumentHandle::title)
        .register_get("body", DocumentHandle::body)
        .register_get("head", DocumentHandle::head)
        .register_get("documentElement", DocumentHandle::document_element);

    engine
        .register_type_with_name::<ElementHandle>("Element")
        .register_get("tagName", ElementHandle::tag_name)
        .register_get("id", ElementHandle::id)
        .register_get("className", ElementHandle::class_name)
        .register_get("classList", ElementHandle::class_list)
        .register_get("textContent", ElementHandle::text_content)
        .register_get("innerHTML", ElementHandle::inner_html)
        .register_get("outerHTML", ElementHandle::outer_html)
        .register_get("attributes", ElementHandle::attributes)
        .register_get("children", ElementHandle::children)
        .register_get("childElementCount", ElementHandle::child_element_count)
        .register_get("parentElement", ElementHandle::parent_element)
        .register_get("firstElementChild", ElementHandle::first_element_child)
        .register_get("lastElementChild", ElementHandle::last_element_child)
        .register_get("nextElementSibling", ElementHandle::next_element_sibling)
        .register_get("previousElementSibling", ElementHandle::previous_element_sibling)
        .register_fn("getAttribute", ElementHandle::get_attribute)
        .register_fn("hasAttribute", ElementHandle::has_attribute)
        .register_fn("querySelector", ElementHandle::query_selector)
        .register_fn("querySelectorAll", ElementHandle::query_selector_all)
        .register_fn("matches", ElementHandle::matches)
        .register_fn("closest", ElementHandle::closest)
        .register_fn("contains", ElementHandle::contains)
        .register_fn("to_string", ElementHandle::describe)
        .register_fn("to_debug", ElementHandle::describe)
        .register_fn("==", |a: &mut ElementHandle, b: ElementHandle| a.same(&b))
        .register_fn("!=", |a: &mut ElementHandle, b: ElementHandle| !a.same(&b));
}

/// Register `getComputedStyle(el)` and `style.getPropertyValue(name)`
pub fn register_computed_style(engine: &mut Engine) {
    engine
        .register_fn("getComputedStyle", ElementHandle::computed_style_map)
        .register_fn("getPropertyValue", |style: &mut Map, name: &str| -> String {
            style
                .get(name)
                .map(|value| value.to_string())
                .unwrap_or_default()
        });
}
