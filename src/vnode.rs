//! The virtual node model.
//!
//! [`VNode`]s are cheap to clone and never mutated once handed to the reconciler.
//! The builder methods stand in for element-factory calls.

use crate::{
	component::ComponentClass,
	hooks::{ForwardRef, FunctionComponent, Memo},
	scheduler::Updater,
	target::{EventHandler, NodeId},
	Error,
};
use core::{
	any::Any,
	cell::RefCell,
	fmt::{self, Debug, Display, Formatter},
};
use indexmap::IndexMap;
use std::{borrow::Cow, rc::Rc};

/// Ordered name → value mapping, used for attributes and class component state.
pub type Map = IndexMap<Cow<'static, str>, Value>;

/// Class component state. Partial states are merged key by key.
pub type State = Map;

/// Ordered style property → value mapping.
pub type Style = IndexMap<Cow<'static, str>, Rc<str>>;

/// Stable identity of a child within its sibling list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
	Str(Rc<str>),
	Int(i64),
}

impl Display for Key {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Key::Str(key) => write!(f, "{:?}", key),
			Key::Int(key) => Display::fmt(key, f),
		}
	}
}

impl From<&str> for Key {
	fn from(key: &str) -> Self {
		Self::Str(key.into())
	}
}

impl From<String> for Key {
	fn from(key: String) -> Self {
		Self::Str(key.into())
	}
}

impl From<i64> for Key {
	fn from(key: i64) -> Self {
		Self::Int(key)
	}
}

impl From<i32> for Key {
	fn from(key: i32) -> Self {
		Self::Int(key.into())
	}
}

/// Attribute, prop and state values.
///
/// Equality is shallow: scalars and strings compare by value, everything behind an [`Rc`] by identity.
#[derive(Clone)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Rc<str>),
	Style(Rc<Style>),
	Handler(EventHandler),
	Any(Rc<dyn Any>),
}

impl Value {
	pub fn any<T: Any>(value: T) -> Self {
		Self::Any(Rc::new(value))
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_int(&self) -> Option<i64> {
		match *self {
			Value::Int(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match *self {
			Value::Bool(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match self {
			Value::Any(value) => value.downcast_ref(),
			_ => None,
		}
	}

	/// Identity comparison as used by [`shallow_equal`] and the attribute diff.
	#[must_use]
	pub fn same(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			#[allow(clippy::float_cmp)]
			(Value::Float(a), Value::Float(b)) => a == b,
			(Value::Str(a), Value::Str(b)) => a == b,
			(Value::Style(a), Value::Style(b)) => Rc::ptr_eq(a, b),
			(Value::Handler(a), Value::Handler(b)) => Rc::ptr_eq(a, b),
			(Value::Any(a), Value::Any(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// The string written through [`TargetTree::set_attribute`](`crate::TargetTree::set_attribute`).
	pub(crate) fn to_attribute_string(&self) -> Cow<'_, str> {
		match self {
			Value::Null => Cow::Borrowed(""),
			Value::Bool(value) => Cow::Borrowed(if *value { "true" } else { "false" }),
			Value::Int(value) => Cow::Owned(value.to_string()),
			Value::Float(value) => Cow::Owned(value.to_string()),
			Value::Str(value) => Cow::Borrowed(value),
			Value::Style(_) | Value::Handler(_) | Value::Any(_) => Cow::Borrowed(""),
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.same(other)
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
			Value::Int(value) => f.debug_tuple("Int").field(value).finish(),
			Value::Float(value) => f.debug_tuple("Float").field(value).finish(),
			Value::Str(value) => f.debug_tuple("Str").field(value).finish(),
			Value::Style(style) => f.debug_tuple("Style").field(style).finish(),
			Value::Handler(handler) => write!(f, "Handler({:p})", Rc::as_ptr(handler)),
			Value::Any(value) => write!(f, "Any({:p})", Rc::as_ptr(value)),
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::Str(value.into())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::Str(value.into())
	}
}

impl From<Rc<str>> for Value {
	fn from(value: Rc<str>) -> Self {
		Self::Str(value)
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<EventHandler> for Value {
	fn from(handler: EventHandler) -> Self {
		Self::Handler(handler)
	}
}

/// Collects `entries` into a [`Map`], e.g. a [`State`] or a partial state for [`Updater::set_state`].
pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Map
where
	K: Into<Cow<'static, str>>,
	V: Into<Value>,
{
	entries.into_iter().map(|(name, value)| (name.into(), value.into())).collect()
}

/// `true` iff both maps have the same keys and each pair of values is [`Value::same`].
#[must_use]
pub fn shallow_equal(a: &Map, b: &Map) -> bool {
	a.len() == b.len() && a.iter().all(|(name, value)| b.get(name).map_or(false, |other| value.same(other)))
}

/// What a component receives: its attributes and the children it was given.
#[derive(Debug, Clone)]
pub struct Props {
	pub attributes: Map,
	pub children: Rc<[VNode]>,
}

impl Default for Props {
	fn default() -> Self {
		Self { attributes: Map::new(), children: Rc::new([]) }
	}
}

impl Props {
	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.attributes.get(name)
	}

	#[must_use]
	pub fn children(&self) -> &[VNode] {
		&self.children
	}

	/// Shallow comparison of attributes; children compare by identity, unless both lists are empty.
	#[must_use]
	pub fn shallow_equal(&self, other: &Self) -> bool {
		shallow_equal(&self.attributes, &other.attributes)
			&& (Rc::ptr_eq(&self.children, &other.children) || self.children.is_empty() && other.children.is_empty())
	}
}

/// What a [`NodeRef`] points at while its owner is mounted.
#[derive(Debug, Clone)]
pub enum RefValue {
	Node(NodeId),
	Instance(Updater),
}

/// Shared cell that the reconciler fills with a realized node or class instance and clears on unmount.
#[derive(Debug, Clone, Default)]
pub struct NodeRef(Rc<RefCell<Option<RefValue>>>);

impl NodeRef {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn get(&self) -> Option<RefValue> {
		self.0.borrow().clone()
	}

	#[must_use]
	pub fn node(&self) -> Option<NodeId> {
		match *self.0.borrow() {
			Some(RefValue::Node(node)) => Some(node),
			_ => None,
		}
	}

	pub(crate) fn set(&self, value: RefValue) {
		*self.0.borrow_mut() = Some(value);
	}

	pub(crate) fn clear(&self) {
		self.0.borrow_mut().take();
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

/// A value shared with a subtree through [`VNode::provider`] and read through [`VNode::consumer`] or [`Hooks::use_context`](`crate::Hooks::use_context`).
///
/// Providers write their value into the cell as they are rendered; it is not restored afterwards.
#[derive(Debug, Clone)]
pub struct Context(Rc<RefCell<Value>>);

impl Context {
	#[must_use]
	pub fn new(default: impl Into<Value>) -> Self {
		Self(Rc::new(RefCell::new(default.into())))
	}

	#[must_use]
	pub fn get(&self) -> Value {
		self.0.borrow().clone()
	}

	pub(crate) fn set(&self, value: Value) {
		*self.0.borrow_mut() = value;
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

pub type RenderProp = Rc<dyn Fn(&Value) -> Result<VNode, Error>>;

/// Reads a [`Context`] and renders with its current value.
#[derive(Clone)]
pub struct Consumer {
	pub context: Context,
	pub render: RenderProp,
}

/// What a [`VNode`] describes. Two nodes can only be updated in place if [`Kind::same`] holds.
#[derive(Clone)]
pub enum Kind {
	Element(Rc<str>),
	Text(Rc<str>),
	Fragment,
	Class(ComponentClass),
	Function(FunctionComponent),
	Memo(Memo),
	Provider(Context),
	Consumer(Consumer),
	ForwardRef(ForwardRef),
}

impl Kind {
	/// Whether `self` and `other` describe the same kind of tree position. Text content does not count.
	#[must_use]
	pub fn same(&self, other: &Self) -> bool {
		match (self, other) {
			(Kind::Element(a), Kind::Element(b)) => a == b,
			(Kind::Text(_), Kind::Text(_)) | (Kind::Fragment, Kind::Fragment) => true,
			(Kind::Class(a), Kind::Class(b)) => a.ptr_eq(b),
			(Kind::Function(a), Kind::Function(b)) => a.ptr_eq(b),
			(Kind::Memo(a), Kind::Memo(b)) => a.ptr_eq(b),
			(Kind::Provider(a), Kind::Provider(b)) => a.ptr_eq(b),
			(Kind::Consumer(a), Kind::Consumer(b)) => a.context.ptr_eq(&b.context),
			(Kind::ForwardRef(a), Kind::ForwardRef(b)) => a.ptr_eq(b),
			_ => false,
		}
	}

	pub(crate) fn name(&self) -> &str {
		match self {
			Kind::Element(tag) => tag,
			Kind::Text(_) => "#text",
			Kind::Fragment => "#fragment",
			Kind::Class(class) => class.name(),
			Kind::Function(function) => function.name(),
			Kind::Memo(memo) => memo.name(),
			Kind::Provider(_) => "#provider",
			Kind::Consumer(_) => "#consumer",
			Kind::ForwardRef(forward_ref) => forward_ref.name(),
		}
	}
}

impl Debug for Kind {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Kind::Text(text) if cfg!(feature = "dangerous-logging") => f.debug_tuple("Text").field(text).finish(),
			_ => f.write_str(self.name()),
		}
	}
}

/// One desired tree position for one render pass.
#[derive(Debug, Clone)]
pub struct VNode {
	pub kind: Kind,
	pub props: Props,
	pub key: Option<Key>,
	pub node_ref: Option<NodeRef>,
}

impl VNode {
	fn of(kind: Kind) -> Self {
		Self { kind, props: Props::default(), key: None, node_ref: None }
	}

	pub fn element(tag: impl Into<Rc<str>>) -> Self {
		Self::of(Kind::Element(tag.into()))
	}

	pub fn text(content: impl Into<Rc<str>>) -> Self {
		Self::of(Kind::Text(content.into()))
	}

	pub fn fragment(children: impl IntoIterator<Item = VNode>) -> Self {
		Self::of(Kind::Fragment).children(children)
	}

	/// Renders nothing.
	#[must_use]
	pub fn empty() -> Self {
		Self::of(Kind::Fragment)
	}

	#[must_use]
	pub fn class(class: &ComponentClass) -> Self {
		Self::of(Kind::Class(class.clone()))
	}

	#[must_use]
	pub fn function(component: &FunctionComponent) -> Self {
		Self::of(Kind::Function(component.clone()))
	}

	#[must_use]
	pub fn memo(memo: &Memo) -> Self {
		Self::of(Kind::Memo(memo.clone()))
	}

	#[must_use]
	pub fn forward_ref(forward_ref: &ForwardRef) -> Self {
		Self::of(Kind::ForwardRef(forward_ref.clone()))
	}

	pub fn provider(context: &Context, value: impl Into<Value>) -> Self {
		Self::of(Kind::Provider(context.clone())).attr("value", value)
	}

	pub fn consumer(context: &Context, render: impl Fn(&Value) -> Result<VNode, Error> + 'static) -> Self {
		Self::of(Kind::Consumer(Consumer { context: context.clone(), render: Rc::new(render) }))
	}

	#[must_use]
	pub fn attr(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
		self.props.attributes.insert(name.into(), value.into());
		self
	}

	/// Sets one property of the `style` attribute, creating it if necessary.
	#[must_use]
	pub fn style(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Rc<str>>) -> Self {
		let entry = self.props.attributes.entry(Cow::Borrowed("style")).or_insert_with(|| Value::Style(Rc::default()));
		if !matches!(entry, Value::Style(_)) {
			*entry = Value::Style(Rc::default());
		}
		if let Value::Style(style) = entry {
			Rc::make_mut(style).insert(name.into(), value.into());
		}
		self
	}

	/// Binds `handler` to `event` (stored as the `on{event}` attribute).
	#[must_use]
	pub fn on(self, event: &str, handler: impl Fn(&dyn Any) + 'static) -> Self {
		self.handler(event, Rc::new(handler))
	}

	/// Like [`on`](`VNode::on`), for a handler whose identity should survive re-renders.
	#[must_use]
	pub fn handler(self, event: &str, handler: EventHandler) -> Self {
		self.attr(format!("on{}", event), Value::Handler(handler))
	}

	#[must_use]
	pub fn key(mut self, key: impl Into<Key>) -> Self {
		self.key = Some(key.into());
		self
	}

	#[must_use]
	pub fn with_ref(mut self, node_ref: &NodeRef) -> Self {
		self.node_ref = Some(node_ref.clone());
		self
	}

	#[must_use]
	pub fn child(mut self, child: impl Into<VNode>) -> Self {
		let mut children = self.props.children.to_vec();
		children.push(child.into());
		self.props.children = children.into();
		self
	}

	#[must_use]
	pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
		self.props.children = children.into_iter().collect();
		self
	}
}

impl From<&str> for VNode {
	fn from(text: &str) -> Self {
		Self::text(text)
	}
}

impl From<String> for VNode {
	fn from(text: String) -> Self {
		Self::text(text)
	}
}
