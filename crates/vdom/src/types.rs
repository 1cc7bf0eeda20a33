use core_types::HostId;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Event delivered to a listener registered through an `on<Name>` prop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub name: Arc<str>,
    pub target: HostId,
}

/// Shared event callback carried by a prop.
///
/// Equality is identity: two handlers are equal only if they share the same
/// allocation.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Handler(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", self.addr())
    }
}

/// Value of a single prop.
///
/// `PartialEq` is structural (used when comparing subtrees). Identity
/// comparison, as used for memoization dependencies, is [`PropValue::is_same`].
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(Arc<str>),
    List(Arc<[PropValue]>),
    Record(Arc<BTreeMap<Arc<str>, PropValue>>),
    Handler(Handler),
}

impl PropValue {
    /// Identity comparison with `Object.is` semantics.
    ///
    /// Scalars compare by value (`NaN` is the same as `NaN`, `0.0` is not the
    /// same as `-0.0`); lists, records and handlers compare by allocation.
    pub fn is_same(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Null, PropValue::Null) => true,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (PropValue::Text(a), PropValue::Text(b)) => a == b,
            (PropValue::List(a), PropValue::List(b)) => Arc::ptr_eq(a, b),
            (PropValue::Record(a), PropValue::Record(b)) => Arc::ptr_eq(a, b),
            (PropValue::Handler(a), PropValue::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Reconciliation key derived from a `key` prop.
    ///
    /// Falsy values (empty text, zero, `NaN`, `false`, null) yield no key.
    /// Keys are compared as text, so the number `1` and the string `"1"` are
    /// the same key, both for keyed matching and for [`crate::has_changed`].
    pub fn as_key(&self) -> Option<Arc<str>> {
        match self {
            PropValue::Text(text) if !text.is_empty() => Some(Arc::clone(text)),
            PropValue::Number(n) if *n != 0.0 && !n.is_nan() => Some(js_number(*n).into()),
            PropValue::Bool(true) => Some("true".into()),
            PropValue::List(_) | PropValue::Record(_) | PropValue::Handler(_) => {
                self.render().map(Into::into)
            }
            _ => None,
        }
    }

    /// Attribute text for this value, or `None` when the attribute should be
    /// omitted.
    pub fn render(&self) -> Option<String> {
        match self {
            PropValue::Null | PropValue::Bool(false) => None,
            PropValue::Bool(true) => Some(String::new()),
            PropValue::Number(n) => Some(js_number(*n)),
            PropValue::Text(text) => Some(text.to_string()),
            PropValue::List(items) => Some(
                items
                    .iter()
                    .map(|item| item.render().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            PropValue::Record(_) => Some("[object Object]".to_string()),
            PropValue::Handler(_) => None,
        }
    }

    /// Stable text fragment used to compose cache keys.
    pub fn fragment(&self) -> String {
        match self {
            PropValue::Null => "null".to_string(),
            PropValue::Bool(b) => b.to_string(),
            PropValue::Number(n) => js_number(*n),
            PropValue::Text(text) => text.to_string(),
            PropValue::List(items) => format!("list@{:p}", Arc::as_ptr(items)),
            PropValue::Record(map) => format!("record@{:p}", Arc::as_ptr(map)),
            PropValue::Handler(handler) => format!("fn@{:p}", handler.addr()),
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

/// Render a number the way a JS host would stringify it.
pub fn js_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.into())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value.into())
    }
}

impl From<Arc<str>> for PropValue {
    fn from(value: Arc<str>) -> Self {
        PropValue::Text(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Number(f64::from(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<Handler> for PropValue {
    fn from(value: Handler) -> Self {
        PropValue::Handler(value)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(value: Vec<PropValue>) -> Self {
        PropValue::List(value.into())
    }
}

/// Prop map of a composite node. Iteration order is by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props(BTreeMap<Arc<str>, PropValue>);

impl Props {
    pub const KEY: &'static str = "key";

    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: impl Into<Arc<str>>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<Arc<str>>, value: impl Into<PropValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &PropValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reconciliation key carried by the `key` prop, if any.
    pub fn key(&self) -> Option<Arc<str>> {
        self.get(Self::KEY).and_then(PropValue::as_key)
    }
}

impl<K: Into<Arc<str>>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Props::new();
        for (name, value) in iter {
            props.insert(name, value);
        }
        props
    }
}

/// Immutable description of a host node or a text value.
///
/// `Clone` copies the node structure of the subtree. Strings, list and
/// record prop values and handlers are immutable and shared by reference.
#[derive(Clone, Debug, PartialEq)]
pub enum VNode {
    Text(Arc<str>),
    Element(Element),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Element,
}

impl VNode {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        VNode::Text(text.into())
    }

    /// Element with an already flattened child list.
    pub fn element(tag: impl Into<Arc<str>>, props: Props, children: Vec<VNode>) -> Self {
        VNode::Element(Element::new(tag.into(), props, children))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            VNode::Text(_) => NodeKind::Text,
            VNode::Element(_) => NodeKind::Element,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            VNode::Element(element) => element.key(),
            VNode::Text(_) => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            VNode::Element(element) => Some(element.tag()),
            VNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element(element) => element.children(),
            VNode::Text(_) => &[],
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            VNode::Element(element) => Some(element),
            VNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            VNode::Text(text) => Some(text),
            VNode::Element(_) => None,
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(VNode::subtree_len)
            .sum::<usize>()
    }
}

/// Composite node record. Fields are private so `key` always mirrors
/// `props.key`.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    tag: Arc<str>,
    props: Props,
    children: Vec<VNode>,
    key: Option<Arc<str>>,
}

impl Element {
    pub(crate) fn new(tag: Arc<str>, props: Props, children: Vec<VNode>) -> Self {
        let key = props.key();
        Self {
            tag,
            props,
            children,
            key,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}
