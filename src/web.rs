//! A [`TargetTree`] over the browser DOM.
//!
//! DOM exceptions are logged and skipped; the reconciler's view of the tree is not rolled back.

use crate::{
	rc_hash_map::RcHashMap,
	target::{EventHandler, NodeId, TargetTree},
};
use hashbrown::HashMap;
use js_sys::{Function, Reflect};
use std::rc::Rc;
use tracing::{error, info, instrument, trace};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};

/// Name of the JavaScript property through which a DOM node's [`NodeId`] is found again.
const NODE_ID_PROPERTY: &str = "__reconcileDomNodeId";

/// Renders into a live document.
///
/// # Event listeners
///
/// Each distinct [`EventHandler`] is wrapped in one [`Closure`], shared by all of its bindings and reference-counted.
/// Closures are dropped when their last binding is removed (or replaced) by the reconciler,
/// or at the latest when the [`WebTree`] itself is dropped, after which remaining listeners throw if invoked.
pub struct WebTree {
	document: web_sys::Document,
	nodes: Vec<Option<web_sys::Node>>,
	bindings: HashMap<(NodeId, String), usize>,
	listeners: RcHashMap<usize, u16, Closure<dyn Fn(web_sys::Event)>>,
}

impl WebTree {
	#[must_use]
	pub fn new(document: web_sys::Document) -> Self {
		Self {
			document,
			nodes: Vec::new(),
			bindings: HashMap::new(),
			listeners: RcHashMap::default(),
		}
	}

	/// Registers an existing node, typically the container to render into.
	pub fn adopt(&mut self, node: web_sys::Node) -> NodeId {
		self.register(node)
	}

	#[must_use]
	pub fn node(&self, id: NodeId) -> Option<&web_sys::Node> {
		self.nodes.get(id).and_then(Option::as_ref)
	}

	fn register(&mut self, node: web_sys::Node) -> NodeId {
		let id = self.nodes.len();
		#[allow(clippy::cast_precision_loss)]
		let tag = JsValue::from_f64(id as f64);
		if let Err(error) = Reflect::set(&node, &JsValue::from_str(NODE_ID_PROPERTY), &tag) {
			error!("Failed to tag node with its id: {:?}", error);
		}
		self.nodes.push(Some(node));
		id
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn lookup(node: &web_sys::Node) -> Option<NodeId> {
		Reflect::get(node, &JsValue::from_str(NODE_ID_PROPERTY)).ok().and_then(|id| id.as_f64()).map(|id| id as NodeId)
	}

	fn get(&self, id: NodeId) -> Option<&web_sys::Node> {
		let node = self.node(id);
		if node.is_none() {
			error!("Unknown or released node {}.", id);
		}
		node
	}

	fn unbind(&mut self, node: NodeId, event: &str, listener: usize) {
		match self.listeners.release(&listener) {
			Ok(Some(closure)) => {
				if let Some(target) = self.nodes.get(node).and_then(Option::as_ref) {
					if let Err(error) = target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref::<Function>()) {
						error!("Failed to remove {} listener: {:?}", event, error);
					}
				}
			}
			Ok(None) => error!("Tried to remove an unknown {} listener.", event),
			Err(error) => error!("Failed to release {} listener: {}", event, error),
		}
	}

	fn sweep(&mut self) {
		let freed = self.listeners.sweep();
		trace!("Freed {} event listener(s).", freed);
		info!("Event listener count/cached capacity: {}/{}", self.listeners.len(), self.listeners.capacity());
	}
}

impl TargetTree for WebTree {
	#[instrument(skip(self))]
	fn create_element(&mut self, tag: &str) -> NodeId {
		match self.document.create_element(tag) {
			Ok(element) => self.register(element.into()),
			Err(error) => {
				error!("Failed to create <{}>: {:?}; using an empty text node instead.", tag, error);
				let placeholder = self.document.create_text_node("");
				self.register(placeholder.into())
			}
		}
	}

	fn create_text(&mut self, text: &str) -> NodeId {
		let text = self.document.create_text_node(text);
		self.register(text.into())
	}

	fn create_fragment(&mut self) -> NodeId {
		let fragment = self.document.create_document_fragment();
		self.register(fragment.into())
	}

	fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
		match self.get(node).and_then(|node| node.dyn_ref::<web_sys::Element>()) {
			Some(element) => {
				if let Err(error) = element.set_attribute(name, value) {
					error!("Failed to set attribute {}: {:?}", name, error);
				}
			}
			None => error!("Can't set attribute {} on a non-element.", name),
		}
	}

	fn set_style(&mut self, node: NodeId, name: &str, value: &str) {
		match self.get(node).and_then(|node| node.dyn_ref::<web_sys::HtmlElement>()) {
			Some(element) => {
				if let Err(error) = element.style().set_property(name, value) {
					error!("Failed to set style property {}: {:?}", name, error);
				}
			}
			None => error!("Can't set style property {} on a non-HTML element.", name),
		}
	}

	#[instrument(skip(self, handler))]
	fn set_event_handler(&mut self, node: NodeId, event: &str, handler: EventHandler) {
		let listener = Rc::as_ptr(&handler).cast::<()>() as usize;
		let binding = (node, event.to_owned());
		if self.bindings.get(&binding) == Some(&listener) {
			return;
		}
		if let Some(previous) = self.bindings.remove(&binding) {
			self.unbind(node, event, previous);
		}

		let target = match self.nodes.get(node).and_then(Option::as_ref) {
			Some(target) => target.clone(),
			None => return error!("Can't bind {} on unknown node {}.", event, node),
		};
		let closure = self.listeners.acquire(listener, |_| {
			Closure::wrap(Box::new(move |event: web_sys::Event| {
				let span = tracing::trace_span!("Event handler", event_type = %event.type_());
				let _enter = span.enter();
				handler(&event);
			}) as Box<dyn Fn(web_sys::Event)>)
		});
		match closure {
			Ok(closure) => {
				if let Err(error) = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref::<Function>()) {
					error!("Failed to add {} listener: {:?}", event, error);
				}
				self.bindings.insert(binding, listener);
			}
			Err(error) => error!("Failed to share {} listener: {}", event, error),
		}
		self.sweep();
	}

	fn clear_event_handlers(&mut self, node: NodeId) {
		let bindings: Vec<(String, usize)> = self
			.bindings
			.iter()
			.filter(|((bound, _), _)| *bound == node)
			.map(|((_, event), listener)| (event.clone(), *listener))
			.collect();
		for (event, listener) in bindings {
			self.bindings.remove(&(node, event.clone()));
			self.unbind(node, &event, listener);
		}
		self.sweep();
	}

	fn set_text(&mut self, node: NodeId, text: &str) {
		if let Some(node) = self.get(node) {
			node.set_text_content(Some(text));
		}
	}

	fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
		let reference = reference.and_then(|reference| self.get(reference));
		if let (Some(parent), Some(node)) = (self.get(parent), self.get(node)) {
			if let Err(error) = parent.insert_before(node, reference) {
				error!("Failed to insert node: {:?}", error);
			}
		}
	}

	fn append_child(&mut self, parent: NodeId, node: NodeId) {
		if let (Some(parent), Some(node)) = (self.get(parent), self.get(node)) {
			if let Err(error) = parent.append_child(node) {
				error!("Failed to append node: {:?}", error);
			}
		}
	}

	fn remove_child(&mut self, parent: NodeId, node: NodeId) {
		if let (Some(parent), Some(node)) = (self.get(parent), self.get(node)) {
			if let Err(error) = parent.remove_child(node) {
				error!("Failed to remove node: {:?}", error);
			}
		}
	}

	fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
		let sibling = self.node(node)?.next_sibling()?;
		let id = Self::lookup(&sibling);
		if id.is_none() {
			trace!("Next sibling of node {} is not managed.", node);
		}
		id
	}

	fn release(&mut self, node: NodeId) {
		if let Some(slot) = self.nodes.get_mut(node) {
			slot.take();
		}
	}
}
