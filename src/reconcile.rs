//! Realization, in-place updates, keyed child diffing and unmounting.
//!
//! A [`Fiber`] is the retained record of one realized [`VNode`]: the node(s) it produced, its component instance and its children.
//! Nothing here ever reads a node's position from the target tree; fragments and components are located through
//! the first node they (transitively) produced and [`TargetTree::next_sibling`].

use crate::{
	component::ClassInstance,
	hooks::{HookStore, Hooks},
	scheduler::{Runtime, Work},
	target::{EventHandler, NodeId, TargetTree},
	vnode::{Key, Kind, Map, NodeRef, Props, RefValue, VNode, Value},
	Error,
};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
	mem,
};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{error, instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, warn, Level};

pub(crate) struct Fiber {
	pub(crate) kind: Kind,
	pub(crate) props: Props,
	pub(crate) key: Option<Key>,
	pub(crate) node_ref: Option<NodeRef>,
	/// Index within the sibling list as of the last reconciliation.
	pub(crate) mount_index: usize,
	pub(crate) body: Body,
}

pub(crate) enum Body {
	Text(NodeId),
	Element { node: NodeId, children: Vec<Fiber> },
	/// Fragments and providers.
	Fragment(Vec<Fiber>),
	Class(Rc<ClassInstance>),
	/// Function components, memos and forward-refs.
	Function { hooks: Rc<HookStore>, produced: Box<Fiber> },
	Consumer(Box<Fiber>),
}

impl Fiber {
	/// Stands in for a fiber that was moved out with [`mem::replace`].
	fn placeholder() -> Self {
		Self {
			kind: Kind::Fragment,
			props: Props::default(),
			key: None,
			node_ref: None,
			mount_index: 0,
			body: Body::Fragment(Vec::new()),
		}
	}

	pub(crate) fn first_node(&self) -> Option<NodeId> {
		match &self.body {
			Body::Text(node) | Body::Element { node, .. } => Some(*node),
			Body::Fragment(children) => children.iter().find_map(Fiber::first_node),
			Body::Class(instance) => instance.produced.borrow().as_ref().and_then(Fiber::first_node).or_else(|| instance.placeholder.get()),
			Body::Function { produced, .. } | Body::Consumer(produced) => produced.first_node(),
		}
	}

	pub(crate) fn last_node(&self) -> Option<NodeId> {
		match &self.body {
			Body::Text(node) | Body::Element { node, .. } => Some(*node),
			Body::Fragment(children) => children.iter().rev().find_map(Fiber::last_node),
			Body::Class(instance) => instance.produced.borrow().as_ref().and_then(Fiber::last_node).or_else(|| instance.placeholder.get()),
			Body::Function { produced, .. } | Body::Consumer(produced) => produced.last_node(),
		}
	}

	/// The top-level nodes this fiber contributes to its parent, in order.
	pub(crate) fn collect_nodes(&self, nodes: &mut Vec<NodeId>) {
		match &self.body {
			Body::Text(node) | Body::Element { node, .. } => nodes.push(*node),
			Body::Fragment(children) => children.iter().for_each(|child| child.collect_nodes(nodes)),
			Body::Class(instance) => {
				let before = nodes.len();
				if let Some(produced) = instance.produced.borrow().as_ref() {
					produced.collect_nodes(nodes);
				}
				if nodes.len() == before {
					nodes.extend(instance.placeholder.get());
				}
			}
			Body::Function { produced, .. } | Body::Consumer(produced) => produced.collect_nodes(nodes),
		}
	}

	/// Whether a function component within this subtree changed its state since it last rendered.
	fn has_dirty_hooks(&self) -> bool {
		match &self.body {
			Body::Text(_) => false,
			Body::Element { children, .. } | Body::Fragment(children) => children.iter().any(Fiber::has_dirty_hooks),
			Body::Class(instance) => instance.produced.borrow().as_ref().map_or(false, Fiber::has_dirty_hooks),
			Body::Function { hooks, produced } => hooks.is_dirty() || produced.has_dirty_hooks(),
			Body::Consumer(produced) => produced.has_dirty_hooks(),
		}
	}
}

impl Debug for Fiber {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Fiber").field("kind", &self.kind).field("key", &self.key).field("mount_index", &self.mount_index).finish_non_exhaustive()
	}
}

/// How a child is matched against the previous render's siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChildKey {
	Explicit(Key),
	Index(usize),
}

impl ChildKey {
	fn of(key: Option<&Key>, index: usize) -> Self {
		match key {
			Some(key) => ChildKey::Explicit(key.clone()),
			None => ChildKey::Index(index),
		}
	}
}

/// What happens to each position of the new child list.
enum Patch {
	/// Updated in place, no move necessary. Holds the old index.
	Stay(usize),
	/// Updated in place, then moved. Holds the old index.
	Move(usize),
	Place(VNode),
}

fn check_duplicate_keys(children: &[VNode]) -> Result<(), Error> {
	let mut seen = HashSet::with_capacity(children.len());
	for key in children.iter().filter_map(|child| child.key.as_ref()) {
		if !seen.insert(key) {
			error!("Duplicate key {} in child list.", key);
			return Err(Error::DuplicateKey { key: key.clone() });
		}
	}
	Ok(())
}

fn warn_on_mixed_keys(children: &[VNode]) {
	if STATIC_MAX_LEVEL >= Level::WARN {
		let keyed = children.iter().filter(|child| child.key.is_some()).count();
		if keyed != 0 && keyed != children.len() {
			warn!(
				"{} of {} children are keyed.\n\
				Unkeyed children are matched by index and may be updated in place where a move was intended.",
				keyed,
				children.len()
			);
		}
	}
}

fn event_name(attribute: &str) -> String {
	attribute.strip_prefix("on").unwrap_or(attribute).to_ascii_lowercase()
}

/// State of one flush. Borrows the target tree for its whole duration.
pub(crate) struct Pass<'a> {
	pub(crate) runtime: &'a Rc<Runtime>,
	tree: &'a mut dyn TargetTree,
	pending_mounts: Vec<Rc<ClassInstance>>,
	depth: usize,
}

impl<'a> Pass<'a> {
	pub(crate) fn new(runtime: &'a Rc<Runtime>, tree: &'a mut dyn TargetTree) -> Self {
		Self { runtime, tree, pending_mounts: Vec::new(), depth: 0 }
	}

	pub(crate) fn perform(&mut self, work: Work) -> Result<(), Error> {
		match work {
			Work::Class(updater) => match updater.instance() {
				Some(instance) => self.flush_instance(&instance, None),
				None => {
					trace!("Dropping update of a dropped class instance.");
					Ok(())
				}
			},
			Work::Root => self.render_root(),
			Work::Unmount => {
				if let Some(root) = self.runtime.remove_root() {
					if let Some(fiber) = root.fiber {
						self.unmount(root.container, fiber);
					}
				}
				Ok(())
			}
		}
	}

	#[instrument(skip(self))]
	fn render_root(&mut self) -> Result<(), Error> {
		let (container, vnode, fiber) = match self.runtime.take_root() {
			Some(root) => root,
			None => {
				trace!("Nothing mounted.");
				return Ok(());
			}
		};

		match fiber {
			None => {
				let fiber = self.mount(container, vnode, None, 0)?;
				self.runtime.restore_root(fiber);
				Ok(())
			}
			Some(mut fiber) => {
				let result = self.reconcile_slot(container, &mut fiber, vnode, None);
				self.runtime.restore_root(fiber);
				result
			}
		}
	}

	pub(crate) fn defer_did_mount(&mut self, instance: Rc<ClassInstance>) {
		self.pending_mounts.push(instance);
	}

	fn descend(&mut self) -> Result<(), Error> {
		let limit = self.runtime.options.depth_limit;
		if self.depth >= limit {
			error!("Depth limit reached");
			return Err(Error::DepthLimitExceeded { limit });
		}
		self.depth += 1;
		Ok(())
	}

	/// The node following `fiber`'s nodes, or `hint` if it has none.
	pub(crate) fn anchor_after(&self, fiber: &Fiber, hint: Option<NodeId>) -> Option<NodeId> {
		match fiber.last_node() {
			Some(last) => self.tree.next_sibling(last),
			None => hint,
		}
	}

	pub(crate) fn release(&mut self, node: NodeId) {
		self.tree.release(node);
	}

	/// Creates the empty text node that holds `instance`'s position while it renders nothing. The caller attaches it.
	pub(crate) fn create_placeholder(&mut self, instance: &ClassInstance) -> NodeId {
		let node = self.tree.create_text("");
		trace!(node, "{} renders nothing; holding its position.", instance.name());
		instance.placeholder.set(Some(node));
		node
	}

	/// Adds or drops `instance`'s placeholder after its produced tree changed.
	///
	/// `anchor` is the node that followed the instance before the change.
	pub(crate) fn settle_placeholder(&mut self, instance: &ClassInstance, anchor: Option<NodeId>) {
		let empty = instance.produced.borrow().as_ref().and_then(Fiber::first_node).is_none();
		match instance.placeholder.get() {
			None if empty => {
				let node = self.create_placeholder(instance);
				self.tree.insert_before(instance.parent.get(), node, anchor);
			}
			Some(_) if !empty => self.remove_placeholder(instance, instance.parent.get()),
			_ => (),
		}
	}

	pub(crate) fn remove_placeholder(&mut self, instance: &ClassInstance, parent: NodeId) {
		if let Some(node) = instance.placeholder.take() {
			self.tree.remove_child(parent, node);
			self.tree.release(node);
		}
	}

	/// Reconciles one tree position.
	///
	/// `hint` is the node that follows this position. It is only consulted if the old tree has no nodes to orient on.
	pub(crate) fn reconcile(&mut self, parent: NodeId, old: Option<Fiber>, new: Option<VNode>, hint: Option<NodeId>) -> Result<Option<Fiber>, Error> {
		match (old, new) {
			(None, None) => Ok(None),
			(Some(old), None) => {
				self.unmount(parent, old);
				Ok(None)
			}
			(None, Some(new)) => self.mount(parent, new, hint, 0).map(Some),
			(Some(mut old), Some(new)) => {
				self.reconcile_slot(parent, &mut old, new, hint)?;
				Ok(Some(old))
			}
		}
	}

	/// Updates `slot` in place if the kinds match, otherwise replaces it at the same position.
	pub(crate) fn reconcile_slot(&mut self, parent: NodeId, slot: &mut Fiber, new: VNode, hint: Option<NodeId>) -> Result<(), Error> {
		if slot.kind.same(&new.kind) {
			return self.update(parent, slot, new, hint);
		}

		let span = trace_span!("Replacing", from = ?slot.kind, to = ?new.kind);
		let _enter = span.enter();

		let anchor = self.anchor_after(slot, hint);
		let mount_index = slot.mount_index;
		let old = mem::replace(slot, Fiber::placeholder());
		self.unmount(parent, old);
		*slot = self.mount(parent, new, anchor, mount_index)?;
		Ok(())
	}

	/// Realizes `vnode` and inserts it before `reference` (or at the end).
	///
	/// Class instances realized along the way see [`did_mount`](`crate::Component::did_mount`) right after the insertion, children first.
	pub(crate) fn mount(&mut self, parent: NodeId, vnode: VNode, reference: Option<NodeId>, mount_index: usize) -> Result<Fiber, Error> {
		let pending = self.pending_mounts.len();
		let (fiber, node) = self.create(vnode, parent, mount_index)?;
		if let Some(node) = node {
			match reference {
				Some(_) => self.tree.insert_before(parent, node, reference),
				None => self.tree.append_child(parent, node),
			}
			self.release_container(&fiber, node);
		}

		for instance in self.pending_mounts.split_off(pending) {
			self.did_mount(&instance)?;
		}
		Ok(fiber)
	}

	/// Realizes `vnode` without attaching it.
	///
	/// Returns the fiber and the node to insert: the element or text node itself, or a fragment container holding several.
	/// `parent` is where the nodes will eventually live and is recorded for class instances.
	pub(crate) fn create(&mut self, vnode: VNode, parent: NodeId, mount_index: usize) -> Result<(Fiber, Option<NodeId>), Error> {
		self.descend()?;
		let result = self.create_inner(vnode, parent, mount_index);
		self.depth -= 1;
		result
	}

	fn create_inner(&mut self, vnode: VNode, parent: NodeId, mount_index: usize) -> Result<(Fiber, Option<NodeId>), Error> {
		let VNode { kind, props, key, node_ref } = vnode;

		let (body, node) = match &kind {
			Kind::Text(text) => {
				let node = self.tree.create_text(text);
				(Body::Text(node), Some(node))
			}
			Kind::Element(tag) => {
				let span = trace_span!("Creating element", tag = &**tag);
				let _enter = span.enter();
				let node = self.tree.create_element(tag);
				self.apply_attributes(node, None, &props.attributes);
				let children = self.create_children(&props.children, node, node)?;
				(Body::Element { node, children }, Some(node))
			}
			Kind::Fragment => self.create_fragment(&props.children, parent)?,
			Kind::Provider(context) => {
				context.set(props.get("value").cloned().unwrap_or(Value::Null));
				self.create_fragment(&props.children, parent)?
			}
			Kind::Class(class) => {
				let (instance, node) = self.create_class(class, props.clone(), node_ref.as_ref(), parent)?;
				(Body::Class(instance), node)
			}
			Kind::Function(function) => self.create_function(parent, |hooks| function.call(&props, hooks))?,
			Kind::Memo(memo) => self.create_function(parent, |hooks| memo.inner().call(&props, hooks))?,
			Kind::ForwardRef(forward_ref) => self.create_function(parent, |hooks| forward_ref.call(&props, node_ref.as_ref(), hooks))?,
			Kind::Consumer(consumer) => {
				let vnode = (consumer.render)(&consumer.context.get())?;
				let (produced, node) = self.create(vnode, parent, 0)?;
				(Body::Consumer(Box::new(produced)), node)
			}
		};

		if let (Some(node_ref), Body::Text(node) | Body::Element { node, .. }) = (&node_ref, &body) {
			node_ref.set(RefValue::Node(*node));
		}

		Ok((Fiber { kind, props, key, node_ref, mount_index, body }, node))
	}

	fn create_children(&mut self, children: &[VNode], container: NodeId, parent: NodeId) -> Result<Vec<Fiber>, Error> {
		check_duplicate_keys(children)?;
		warn_on_mixed_keys(children);

		let mut fibers = Vec::with_capacity(children.len());
		for (i, child) in children.iter().enumerate() {
			let (fiber, node) = self.create(child.clone(), parent, i)?;
			if let Some(node) = node {
				self.tree.append_child(container, node);
				self.release_container(&fiber, node);
			}
			fibers.push(fiber);
		}
		Ok(fibers)
	}

	/// Fragment containers are empty once inserted and never referenced again.
	fn release_container(&mut self, fiber: &Fiber, node: NodeId) {
		if fiber.first_node() != Some(node) {
			self.tree.release(node);
		}
	}

	fn create_fragment(&mut self, children: &[VNode], parent: NodeId) -> Result<(Body, Option<NodeId>), Error> {
		if children.is_empty() {
			return Ok((Body::Fragment(Vec::new()), None));
		}
		let container = self.tree.create_fragment();
		let children = self.create_children(children, container, parent)?;
		Ok((Body::Fragment(children), Some(container)))
	}

	fn create_function(&mut self, parent: NodeId, render: impl FnOnce(&mut Hooks<'_>) -> Result<VNode, Error>) -> Result<(Body, Option<NodeId>), Error> {
		let hooks = Rc::new(HookStore::default());
		let vnode = self.render_function(&hooks, render)?;
		let (produced, node) = self.create(vnode, parent, 0)?;
		Ok((Body::Function { hooks, produced: Box::new(produced) }, node))
	}

	fn render_function(&self, store: &Rc<HookStore>, render: impl FnOnce(&mut Hooks<'_>) -> Result<VNode, Error>) -> Result<VNode, Error> {
		let mut hooks = Hooks::new(store, self.runtime);
		let vnode = render(&mut hooks)?;
		hooks.finish()?;
		Ok(vnode)
	}

	/// Updates `fiber` in place to match `new`, which must be of the [same kind](`Kind::same`).
	fn update(&mut self, parent: NodeId, fiber: &mut Fiber, new: VNode, hint: Option<NodeId>) -> Result<(), Error> {
		self.descend()?;
		let result = self.update_inner(parent, fiber, new, hint);
		self.depth -= 1;
		result
	}

	#[allow(clippy::too_many_lines)]
	fn update_inner(&mut self, parent: NodeId, fiber: &mut Fiber, new: VNode, hint: Option<NodeId>) -> Result<(), Error> {
		let VNode { kind, props, key, node_ref } = new;

		match (&mut fiber.body, &kind) {
			(Body::Text(node), Kind::Text(text)) => {
				if let Kind::Text(previous) = &fiber.kind {
					if previous != text {
						self.tree.set_text(*node, text);
					}
				}
			}
			(Body::Element { node, children }, Kind::Element(tag)) => {
				let span = trace_span!("Updating element", tag = &**tag);
				let _enter = span.enter();
				let node = *node;
				self.apply_attributes(node, Some(&fiber.props.attributes), &props.attributes);
				self.reconcile_children(node, children, &props.children, None)?;
			}
			(Body::Fragment(children), Kind::Fragment) => {
				let end = self.end_anchor(children, hint);
				self.reconcile_children(parent, children, &props.children, end)?;
			}
			(Body::Fragment(children), Kind::Provider(context)) => {
				context.set(props.get("value").cloned().unwrap_or(Value::Null));
				let end = self.end_anchor(children, hint);
				self.reconcile_children(parent, children, &props.children, end)?;
			}
			(Body::Class(instance), Kind::Class(_)) => {
				let instance = Rc::clone(instance);
				self.update_class(&instance, props.clone(), parent, hint)?;
			}
			(Body::Function { hooks, produced }, Kind::Function(function)) => {
				let vnode = self.render_function(hooks, |h| function.call(&props, h))?;
				self.reconcile_slot(parent, produced, vnode, hint)?;
			}
			(Body::Function { hooks, produced }, Kind::Memo(memo)) => {
				if memo.props_equal(&fiber.props, &props) && !hooks.is_dirty() && !produced.has_dirty_hooks() {
					trace!("Memoized props unchanged; skipping {}.", memo.name());
				} else {
					let vnode = self.render_function(hooks, |h| memo.inner().call(&props, h))?;
					self.reconcile_slot(parent, produced, vnode, hint)?;
				}
			}
			(Body::Function { hooks, produced }, Kind::ForwardRef(forward_ref)) => {
				let vnode = self.render_function(hooks, |h| forward_ref.call(&props, node_ref.as_ref(), h))?;
				self.reconcile_slot(parent, produced, vnode, hint)?;
			}
			(Body::Consumer(produced), Kind::Consumer(consumer)) => {
				let vnode = (consumer.render)(&consumer.context.get())?;
				self.reconcile_slot(parent, produced, vnode, hint)?;
			}
			(_, kind) => unreachable!("Fiber body does not match kind {:?}", kind),
		}

		self.update_ref(fiber, node_ref.as_ref());
		fiber.kind = kind;
		fiber.props = props;
		fiber.key = key;
		fiber.node_ref = node_ref;
		Ok(())
	}

	fn update_ref(&self, fiber: &Fiber, next: Option<&NodeRef>) {
		if let Some(previous) = &fiber.node_ref {
			if next.map_or(true, |next| !next.ptr_eq(previous)) {
				previous.clear();
			}
		}
		let next = match next {
			Some(next) => next,
			None => return,
		};
		match &fiber.body {
			Body::Text(node) | Body::Element { node, .. } => next.set(RefValue::Node(*node)),
			Body::Class(instance) => next.set(RefValue::Instance(instance.updater.clone())),
			_ => (),
		}
	}

	fn end_anchor(&self, children: &[Fiber], hint: Option<NodeId>) -> Option<NodeId> {
		match children.iter().rev().find_map(Fiber::last_node) {
			Some(last) => self.tree.next_sibling(last),
			None => hint,
		}
	}

	fn apply_attributes(&mut self, node: NodeId, old: Option<&Map>, new: &Map) {
		for (name, value) in new {
			let previous = old.and_then(|old| old.get(name));
			if previous.map_or(false, |previous| previous.same(value)) {
				continue;
			}

			match value {
				Value::Style(style) => {
					let previous = match previous {
						Some(Value::Style(previous)) => Some(previous),
						_ => None,
					};
					for (property, value) in style.iter() {
						if previous.and_then(|previous| previous.get(property)) != Some(value) {
							self.tree.set_style(node, property, value);
						}
					}
				}
				Value::Handler(handler) => {
					let event = event_name(name);
					let handler = self.batched(handler);
					self.tree.set_event_handler(node, &event, handler);
				}
				value => {
					if cfg!(feature = "dangerous-logging") {
						trace!(name = &**name, value = ?value, "Setting attribute");
					} else {
						trace!(name = &**name, "Setting attribute");
					}
					self.tree.set_attribute(node, name, &value.to_attribute_string());
				}
			}
		}
	}

	/// Wraps `handler` so that state changes it causes are batched into one flush.
	fn batched(&self, handler: &EventHandler) -> EventHandler {
		let runtime = Rc::downgrade(self.runtime);
		let handler = Rc::clone(handler);
		Rc::new(move |event: &dyn Any| match runtime.upgrade() {
			Some(runtime) => {
				if let Err(error) = runtime.batch(|| handler(event)) {
					error!("Failed to apply updates after event handler: {}", error);
				}
			}
			None => handler(event),
		})
	}

	/// Keyed diff of a child list in place.
	///
	/// `end` is the node following the list within `parent`, if it doesn't extend to the end.
	#[instrument(skip(self, children, new), fields(old_len = children.len(), new_len = new.len()))]
	fn reconcile_children(&mut self, parent: NodeId, children: &mut Vec<Fiber>, new: &[VNode], end: Option<NodeId>) -> Result<(), Error> {
		check_duplicate_keys(new)?;
		warn_on_mixed_keys(new);

		let mut old = mem::take(children);
		let mut positions: HashMap<ChildKey, usize> = old.iter().enumerate().map(|(i, fiber)| (ChildKey::of(fiber.key.as_ref(), i), i)).collect();
		let mut consumed = vec![false; old.len()];

		// Nothing moves or leaves before this loop is done, so old children are still in old order.
		let mut patches = Vec::with_capacity(new.len());
		let mut last_placed_index = 0;
		for (i, vnode) in new.iter().enumerate() {
			let key = ChildKey::of(vnode.key.as_ref(), i);
			match positions.remove(&key) {
				Some(p) if old[p].kind.same(&vnode.kind) => {
					let anchor = old[p + 1..].iter().find_map(Fiber::first_node).or(end);
					self.update(parent, &mut old[p], vnode.clone(), anchor)?;
					consumed[p] = true;

					let old_index = old[p].mount_index;
					old[p].mount_index = i;
					if old_index < last_placed_index {
						trace!(?key, from = old_index, to = i, "MOVE");
						patches.push(Patch::Move(p));
					} else {
						last_placed_index = old_index;
						patches.push(Patch::Stay(p));
					}
				}
				_ => {
					trace!(?key, at = i, "PLACEMENT");
					patches.push(Patch::Place(vnode.clone()));
				}
			}
		}

		let mut old: Vec<Option<Fiber>> = old.into_iter().map(Some).collect();
		for (slot, consumed) in old.iter_mut().zip(consumed) {
			if !consumed {
				if let Some(fiber) = slot.take() {
					self.unmount(parent, fiber);
				}
			}
		}
		for patch in &patches {
			if let Patch::Move(p) = patch {
				if let Some(fiber) = &old[*p] {
					self.detach(parent, fiber);
				}
			}
		}

		let mut reference = patches
			.iter()
			.find_map(|patch| match patch {
				Patch::Stay(p) => old[*p].as_ref().and_then(Fiber::first_node),
				_ => None,
			})
			.or(end);

		children.reserve(patches.len());
		for (i, patch) in patches.into_iter().enumerate() {
			match patch {
				Patch::Stay(p) => {
					if let Some(fiber) = old[p].take() {
						if let Some(last) = fiber.last_node() {
							reference = self.tree.next_sibling(last);
						}
						children.push(fiber);
					}
				}
				Patch::Move(p) => {
					if let Some(fiber) = old[p].take() {
						self.attach(parent, &fiber, reference);
						children.push(fiber);
					}
				}
				Patch::Place(vnode) => {
					let fiber = self.mount(parent, vnode, reference, i)?;
					children.push(fiber);
				}
			}
		}
		Ok(())
	}

	fn detach(&mut self, parent: NodeId, fiber: &Fiber) {
		let mut nodes = Vec::new();
		fiber.collect_nodes(&mut nodes);
		for node in nodes {
			self.tree.remove_child(parent, node);
		}
	}

	fn attach(&mut self, parent: NodeId, fiber: &Fiber, reference: Option<NodeId>) {
		let mut nodes = Vec::new();
		fiber.collect_nodes(&mut nodes);
		for node in nodes {
			match reference {
				Some(_) => self.tree.insert_before(parent, node, reference),
				None => self.tree.append_child(parent, node),
			}
		}
	}

	/// Tears down `fiber`: lifecycle hooks and effect cleanups first, then refs and finally the nodes, leaves before their parents.
	pub(crate) fn unmount(&mut self, parent: NodeId, fiber: Fiber) {
		let Fiber { kind, props, node_ref, body, .. } = fiber;
		let span = trace_span!("Unmounting", ?kind);
		let _enter = span.enter();

		if let Body::Class(instance) = &body {
			instance.will_unmount();
		}
		if let Some(node_ref) = &node_ref {
			node_ref.clear();
		}

		match body {
			Body::Text(node) => {
				self.tree.remove_child(parent, node);
				self.tree.release(node);
			}
			Body::Element { node, children } => {
				for child in children {
					self.unmount(node, child);
				}
				if props.attributes.values().any(|value| matches!(value, Value::Handler(_))) {
					self.tree.clear_event_handlers(node);
				}
				self.tree.remove_child(parent, node);
				self.tree.release(node);
			}
			Body::Fragment(children) => {
				for child in children {
					self.unmount(parent, child);
				}
			}
			Body::Class(instance) => self.unmount_class(&instance, parent),
			Body::Function { hooks, produced } => {
				hooks.teardown();
				self.unmount(parent, *produced);
			}
			Body::Consumer(produced) => self.unmount(parent, *produced),
		}
	}
}
