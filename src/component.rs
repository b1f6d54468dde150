//! Stateful class components and their lifecycle.

use crate::{
	reconcile::{Fiber, Pass},
	scheduler::{fold_deltas, Runtime, Updater},
	target::NodeId,
	vnode::{shallow_equal, NodeRef, Props, RefValue, State, VNode, Value},
	Error,
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	mem,
};
use std::rc::{Rc, Weak};
use tracing::{instrument, trace, trace_span, warn};

/// What a class component's methods see of it.
pub struct Scope<'a> {
	props: &'a Props,
	state: &'a State,
	updater: &'a Updater,
}

impl<'a> Scope<'a> {
	#[must_use]
	pub fn props(&self) -> &'a Props {
		self.props
	}

	#[must_use]
	pub fn state(&self) -> &'a State {
		self.state
	}

	/// Clone this into event handlers to change the state later.
	#[must_use]
	pub fn updater(&self) -> &'a Updater {
		self.updater
	}

	/// Whether `next_props` and `next_state` are shallowly equal to the current ones.
	///
	/// A "pure" component returns the negation of this from [`Component::should_update`].
	#[must_use]
	pub fn unchanged(&self, next_props: &Props, next_state: &State) -> bool {
		self.props.shallow_equal(next_props) && shallow_equal(self.state, next_state)
	}
}

/// A stateful component.
///
/// Only [`render`](`Component::render`) is required. All hooks run while the engine is busy,
/// so state changes they emit are applied once the current flush has finished.
#[allow(unused_variables)]
pub trait Component: 'static {
	/// # Errors
	///
	/// Any [`Error`] aborts the current flush.
	fn render(&self, scope: &Scope<'_>) -> Result<VNode, Error>;

	fn will_mount(&mut self, scope: &Scope<'_>) {}

	/// Called once all of this instance's nodes are attached.
	///
	/// # Errors
	///
	/// Any [`Error`] aborts the current flush.
	fn did_mount(&mut self, scope: &Scope<'_>) -> Result<(), Error> {
		Ok(())
	}

	fn will_receive_props(&mut self, scope: &Scope<'_>, next_props: &Props) {}

	/// Returning `false` skips rendering. The new props and state are committed regardless.
	fn should_update(&self, scope: &Scope<'_>, next_props: &Props, next_state: &State) -> bool {
		true
	}

	fn will_update(&mut self, scope: &Scope<'_>, next_props: &Props, next_state: &State) {}

	/// Called after rendering, before the produced tree is diffed. The result is passed on to [`did_update`](`Component::did_update`).
	fn snapshot_before_update(&self, scope: &Scope<'_>, prev_props: &Props, prev_state: &State) -> Option<Value> {
		None
	}

	/// # Errors
	///
	/// Any [`Error`] aborts the current flush.
	fn did_update(&mut self, scope: &Scope<'_>, prev_props: &Props, prev_state: &State, snapshot: Option<Value>) -> Result<(), Error> {
		Ok(())
	}

	fn will_unmount(&mut self, scope: &Scope<'_>) {}
}

type Construct = dyn Fn(&Props) -> (Box<dyn Component>, State);

/// Computes state from incoming props, before every render. [`None`] leaves the state as is.
pub type DeriveState = fn(&Props, &State) -> Option<State>;

struct ClassDefinition {
	name: &'static str,
	construct: Box<Construct>,
	derive_state: Option<DeriveState>,
}

/// The type of a class component. Identity (not name) decides whether a position is updated in place.
#[derive(Clone)]
pub struct ComponentClass(Rc<ClassDefinition>);

impl ComponentClass {
	/// `construct` receives the initial props and returns the component and its initial state.
	pub fn new<C: Component>(name: &'static str, construct: impl Fn(&Props) -> (C, State) + 'static) -> Self {
		Self::define(name, construct, None)
	}

	pub fn with_derived_state<C: Component>(name: &'static str, construct: impl Fn(&Props) -> (C, State) + 'static, derive_state: DeriveState) -> Self {
		Self::define(name, construct, Some(derive_state))
	}

	fn define<C: Component>(name: &'static str, construct: impl Fn(&Props) -> (C, State) + 'static, derive_state: Option<DeriveState>) -> Self {
		Self(Rc::new(ClassDefinition {
			name,
			construct: Box::new(move |props| {
				let (component, state) = construct(props);
				(Box::new(component), state)
			}),
			derive_state,
		}))
	}

	#[must_use]
	pub fn name(&self) -> &'static str {
		self.0.name
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	fn derive(&self, props: &Props, state: State) -> State {
		match self.0.derive_state.and_then(|derive| derive(props, &state)) {
			Some(partial) => {
				let mut state = state;
				for (name, value) in partial {
					state.insert(name, value);
				}
				state
			}
			None => state,
		}
	}
}

impl Debug for ComponentClass {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ComponentClass").field(&self.0.name).finish()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
	Constructed,
	Mounted,
	Updating,
	Unmounted,
}

pub(crate) struct ClassInstance {
	class: ComponentClass,
	component: RefCell<Box<dyn Component>>,
	props: RefCell<Props>,
	state: RefCell<State>,
	pub(crate) updater: Updater,
	/// Taken out while it is being diffed.
	pub(crate) produced: RefCell<Option<Fiber>>,
	pub(crate) parent: Cell<NodeId>,
	/// Holds this instance's position while its produced tree has no nodes.
	pub(crate) placeholder: Cell<Option<NodeId>>,
	phase: Cell<Phase>,
}

impl ClassInstance {
	fn construct(class: &ComponentClass, props: Props, parent: NodeId, runtime: Weak<Runtime>) -> Rc<Self> {
		let (component, state) = (class.0.construct)(&props);
		Rc::new_cyclic(|this| Self {
			class: class.clone(),
			component: RefCell::new(component),
			props: RefCell::new(props),
			state: RefCell::new(state),
			updater: Updater::new(this.clone(), runtime),
			produced: RefCell::default(),
			parent: Cell::new(parent),
			placeholder: Cell::new(None),
			phase: Cell::new(Phase::Constructed),
		})
	}

	pub(crate) fn state(&self) -> State {
		self.state.borrow().clone()
	}

	pub(crate) fn name(&self) -> &'static str {
		self.class.name()
	}

	fn with_scope<R>(&self, f: impl FnOnce(&Scope<'_>) -> R) -> R {
		let props = self.props.borrow();
		let state = self.state.borrow();
		f(&Scope { props: &props, state: &state, updater: &self.updater })
	}

	fn render(&self) -> Result<VNode, Error> {
		let component = self.component.borrow();
		self.with_scope(|scope| component.render(scope))
	}

	/// Runs [`Component::will_unmount`]. Updates flushed after this are discarded.
	pub(crate) fn will_unmount(&self) {
		self.with_scope(|scope| self.component.borrow_mut().will_unmount(scope));
		self.phase.set(Phase::Unmounted);
	}
}

impl Pass<'_> {
	/// Constructs and realizes a class instance. Its [`Component::did_mount`] is deferred until the nodes are attached.
	#[instrument(skip(self, props, node_ref), fields(class = class.name()))]
	pub(crate) fn create_class(&mut self, class: &ComponentClass, props: Props, node_ref: Option<&NodeRef>, parent: NodeId) -> Result<(Rc<ClassInstance>, Option<NodeId>), Error> {
		let instance = ClassInstance::construct(class, props, parent, Rc::downgrade(self.runtime));
		if let Some(node_ref) = node_ref {
			node_ref.set(RefValue::Instance(instance.updater.clone()));
		}

		instance.with_scope(|scope| instance.component.borrow_mut().will_mount(scope));
		let state = class.derive(&instance.props.borrow(), instance.state());
		*instance.state.borrow_mut() = state;

		let vnode = instance.render()?;
		let (produced, node) = self.create(vnode, parent, 0)?;
		let empty = produced.first_node().is_none();
		*instance.produced.borrow_mut() = Some(produced);
		let node = if empty {
			if let Some(container) = node {
				self.release(container);
			}
			Some(self.create_placeholder(&instance))
		} else {
			node
		};

		self.defer_did_mount(Rc::clone(&instance));
		Ok((instance, node))
	}

	pub(crate) fn did_mount(&mut self, instance: &ClassInstance) -> Result<(), Error> {
		if instance.phase.get() != Phase::Constructed {
			return Ok(());
		}
		instance.phase.set(Phase::Mounted);
		instance.with_scope(|scope| instance.component.borrow_mut().did_mount(scope))
	}

	/// Receives new props from the parent's render and flushes them (with any pending state) right away.
	pub(crate) fn update_class(&mut self, instance: &Rc<ClassInstance>, props: Props, parent: NodeId, hint: Option<NodeId>) -> Result<(), Error> {
		instance.parent.set(parent);
		instance.with_scope(|scope| instance.component.borrow_mut().will_receive_props(scope, &props));
		instance.updater.set_pending_props(props);
		self.flush_instance(instance, hint)
	}

	/// Applies pending props and state deltas, if any.
	pub(crate) fn flush_instance(&mut self, instance: &Rc<ClassInstance>, hint: Option<NodeId>) -> Result<(), Error> {
		let span = trace_span!("Flushing class instance", class = instance.name());
		let _enter = span.enter();

		if instance.phase.get() == Phase::Unmounted {
			warn!("Discarding update of an unmounted {} instance.", instance.name());
			return Ok(());
		}

		let (props, deltas) = instance.updater.take_pending();
		if props.is_none() && deltas.is_empty() {
			trace!("Nothing pending.");
			return Ok(());
		}

		let next_props = props.unwrap_or_else(|| instance.props.borrow().clone());
		let next_state = fold_deltas(instance.state(), deltas);
		let next_state = instance.class.derive(&next_props, next_state);

		let render = instance.with_scope(|scope| instance.component.borrow().should_update(scope, &next_props, &next_state));
		if render {
			instance.with_scope(|scope| instance.component.borrow_mut().will_update(scope, &next_props, &next_state));
		} else {
			trace!("Update skipped by should_update.");
		}

		let prev_props = mem::replace(&mut *instance.props.borrow_mut(), next_props);
		let prev_state = mem::replace(&mut *instance.state.borrow_mut(), next_state);
		if !render {
			return Ok(());
		}

		let previous_phase = instance.phase.replace(Phase::Updating);
		let vnode = instance.render()?;
		let snapshot = instance.with_scope(|scope| instance.component.borrow().snapshot_before_update(scope, &prev_props, &prev_state));

		let parent = instance.parent.get();
		let hint = instance.placeholder.get().or(hint);
		let produced = instance.produced.borrow_mut().take();
		let anchor = produced.as_ref().map_or(hint, |produced| self.anchor_after(produced, hint));
		let produced = self.reconcile(parent, produced, Some(vnode), hint)?;
		*instance.produced.borrow_mut() = produced;
		self.settle_placeholder(instance, anchor);
		instance.phase.set(previous_phase);

		instance.with_scope(|scope| instance.component.borrow_mut().did_update(scope, &prev_props, &prev_state, snapshot))
	}

	/// Unmounts the produced tree of an instance that already saw [`ClassInstance::will_unmount`].
	pub(crate) fn unmount_class(&mut self, instance: &ClassInstance, parent: NodeId) {
		let produced = instance.produced.borrow_mut().take();
		if let Some(produced) = produced {
			self.unmount(parent, produced);
		}
		self.remove_placeholder(instance, parent);
	}
}
