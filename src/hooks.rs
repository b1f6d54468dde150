//! Function components and the per-position hook slots that give them state.
//!
//! Each rendered function component owns one [`HookStore`], addressed by call order.
//! A render must call the same hooks in the same order as the render before it,
//! otherwise [`Error::HookOrderViolation`] is returned.

use crate::{
	scheduler::{Runtime, Work},
	vnode::{Context, NodeRef, Props, VNode, Value},
	Error,
};
use core::{
	any::Any,
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	marker::PhantomData,
	mem,
};
use std::rc::{Rc, Weak};
use tracing::trace;

/// Returned from an effect body, run before the effect runs again and on unmount.
pub type Cleanup = Box<dyn FnOnce()>;

type Render = dyn Fn(&Props, &mut Hooks<'_>) -> Result<VNode, Error>;

struct FunctionDefinition {
	name: &'static str,
	render: Box<Render>,
}

/// A stateless render function that can keep state through [`Hooks`].
#[derive(Clone)]
pub struct FunctionComponent(Rc<FunctionDefinition>);

impl FunctionComponent {
	pub fn new(name: &'static str, render: impl Fn(&Props, &mut Hooks<'_>) -> Result<VNode, Error> + 'static) -> Self {
		Self(Rc::new(FunctionDefinition { name, render: Box::new(render) }))
	}

	#[must_use]
	pub fn name(&self) -> &'static str {
		self.0.name
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// Skips re-rendering while the props are [shallowly equal](`Props::shallow_equal`) and no own state changed.
	#[must_use]
	pub fn memo(&self) -> Memo {
		self.memo_with(Props::shallow_equal)
	}

	/// Like [`memo`](`FunctionComponent::memo`), with `compare(previous, next)` deciding whether the props are equal.
	#[must_use]
	pub fn memo_with(&self, compare: impl Fn(&Props, &Props) -> bool + 'static) -> Memo {
		Memo(Rc::new(MemoDefinition { inner: self.clone(), compare: Box::new(compare) }))
	}

	pub(crate) fn call(&self, props: &Props, hooks: &mut Hooks<'_>) -> Result<VNode, Error> {
		(self.0.render)(props, hooks)
	}
}

impl Debug for FunctionComponent {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("FunctionComponent").field(&self.0.name).finish()
	}
}

struct MemoDefinition {
	inner: FunctionComponent,
	compare: Box<dyn Fn(&Props, &Props) -> bool>,
}

/// A memoized [`FunctionComponent`]. Memoizing the same component twice yields two distinct kinds.
#[derive(Clone)]
pub struct Memo(Rc<MemoDefinition>);

impl Memo {
	#[must_use]
	pub fn name(&self) -> &'static str {
		self.0.inner.name()
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn inner(&self) -> &FunctionComponent {
		&self.0.inner
	}

	pub(crate) fn props_equal(&self, previous: &Props, next: &Props) -> bool {
		(self.0.compare)(previous, next)
	}
}

impl Debug for Memo {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Memo").field(&self.0.inner.name()).finish()
	}
}

type ForwardRender = dyn Fn(&Props, Option<&NodeRef>, &mut Hooks<'_>) -> Result<VNode, Error>;

struct ForwardRefDefinition {
	name: &'static str,
	render: Box<ForwardRender>,
}

/// A function component that receives the [`NodeRef`] attached to its [`VNode`] instead of having it filled with itself.
#[derive(Clone)]
pub struct ForwardRef(Rc<ForwardRefDefinition>);

impl ForwardRef {
	pub fn new(name: &'static str, render: impl Fn(&Props, Option<&NodeRef>, &mut Hooks<'_>) -> Result<VNode, Error> + 'static) -> Self {
		Self(Rc::new(ForwardRefDefinition { name, render: Box::new(render) }))
	}

	#[must_use]
	pub fn name(&self) -> &'static str {
		self.0.name
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn call(&self, props: &Props, node_ref: Option<&NodeRef>, hooks: &mut Hooks<'_>) -> Result<VNode, Error> {
		(self.0.render)(props, node_ref, hooks)
	}
}

impl Debug for ForwardRef {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ForwardRef").field(&self.0.name).finish()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EffectKind {
	/// Runs when the host calls [`Root::flush_effects`](`crate::Root::flush_effects`).
	Passive,
	/// Runs once the current flush has mutated the tree, before control returns.
	Layout,
}

impl EffectKind {
	fn hook_name(self) -> &'static str {
		match self {
			EffectKind::Passive => "use_effect",
			EffectKind::Layout => "use_layout_effect",
		}
	}
}

type CleanupCell = Rc<RefCell<Option<Cleanup>>>;

enum HookSlot {
	State(Box<dyn Any>),
	Memo { value: Box<dyn Any>, deps: Box<dyn Any> },
	Callback { callback: Box<dyn Any>, deps: Box<dyn Any> },
	Effect { kind: EffectKind, deps: Option<Box<dyn Any>>, cleanup: CleanupCell },
	Ref(Box<dyn Any>),
}

impl HookSlot {
	fn name(&self) -> &'static str {
		match self {
			HookSlot::State(_) => "use_state",
			HookSlot::Memo { .. } => "use_memo",
			HookSlot::Callback { .. } => "use_callback",
			HookSlot::Effect { kind, .. } => kind.hook_name(),
			HookSlot::Ref(_) => "use_ref",
		}
	}
}

/// The hook slots of one mounted function component.
#[derive(Default)]
pub(crate) struct HookStore {
	slots: RefCell<Vec<HookSlot>>,
	rendered: Cell<bool>,
	dirty: Cell<bool>,
}

impl HookStore {
	/// Whether a state hook changed since the last render.
	pub(crate) fn is_dirty(&self) -> bool {
		self.dirty.get()
	}

	/// Runs all effect cleanups. Effects that are still scheduled will run regardless.
	pub(crate) fn teardown(&self) {
		let cleanups: Vec<Cleanup> = self
			.slots
			.borrow()
			.iter()
			.filter_map(|slot| match slot {
				HookSlot::Effect { cleanup, .. } => cleanup.borrow_mut().take(),
				_ => None,
			})
			.collect();
		trace!("Running {} effect cleanup(s).", cleanups.len());
		for cleanup in cleanups {
			cleanup();
		}
	}
}

impl Debug for HookStore {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("HookStore")
			.field("slots", &self.slots.borrow().iter().map(HookSlot::name).collect::<Vec<_>>())
			.field("dirty", &self.dirty.get())
			.finish()
	}
}

fn violation(ordinal: usize, expected: &'static str, found: &'static str) -> Error {
	Error::HookOrderViolation { ordinal, expected, found }
}

const OTHER_TYPE: &str = "a slot of another type";

/// Hook access for one render of a function component.
pub struct Hooks<'a> {
	store: &'a Rc<HookStore>,
	runtime: &'a Rc<Runtime>,
	cursor: usize,
}

impl<'a> Hooks<'a> {
	pub(crate) fn new(store: &'a Rc<HookStore>, runtime: &'a Rc<Runtime>) -> Self {
		store.dirty.set(false);
		Self { store, runtime, cursor: 0 }
	}

	fn claim(&mut self, name: &'static str) -> Result<usize, Error> {
		let ordinal = self.cursor;
		self.cursor += 1;
		if self.store.rendered.get() && ordinal >= self.store.slots.borrow().len() {
			return Err(violation(ordinal, "end of render", name));
		}
		Ok(ordinal)
	}

	/// Checks that no hooks were left out, compared to the previous render.
	pub(crate) fn finish(self) -> Result<(), Error> {
		let slots = self.store.slots.borrow();
		if self.store.rendered.get() && self.cursor < slots.len() {
			return Err(violation(self.cursor, slots[self.cursor].name(), "end of render"));
		}
		self.store.rendered.set(true);
		Ok(())
	}

	fn handle(&self, ordinal: usize) -> SlotHandle {
		SlotHandle {
			store: Rc::downgrade(self.store),
			runtime: Rc::downgrade(self.runtime),
			ordinal,
		}
	}

	/// # Errors
	///
	/// [`Error::HookOrderViolation`] if this is not where a `use_state` of the same `T` was called last render.
	pub fn use_state<T: Clone + 'static>(&mut self, init: impl FnOnce() -> T) -> Result<(T, SetState<T>), Error> {
		let ordinal = self.claim("use_state")?;
		if ordinal == self.store.slots.borrow().len() {
			let initial = init();
			self.store.slots.borrow_mut().push(HookSlot::State(Box::new(initial)));
		}

		let value = match &self.store.slots.borrow()[ordinal] {
			HookSlot::State(value) => value.downcast_ref::<T>().cloned().ok_or_else(|| violation(ordinal, "use_state", OTHER_TYPE))?,
			other => return Err(violation(ordinal, "use_state", other.name())),
		};
		Ok((value, SetState { handle: self.handle(ordinal), marker: PhantomData }))
	}

	/// `reducer(state, action)` computes the next state whenever an action is [dispatched](`Dispatch::dispatch`).
	///
	/// # Errors
	///
	/// See [`use_state`](`Hooks::use_state`).
	pub fn use_reducer<S, A>(&mut self, reducer: impl Fn(&S, A) -> S + 'static, init: impl FnOnce() -> S) -> Result<(S, Dispatch<A>), Error>
	where
		S: Clone + 'static,
		A: 'static,
	{
		let (state, set_state) = self.use_state(init)?;
		let reduce = Rc::new(move |slot: &mut Box<dyn Any>, action: A| match slot.downcast_mut::<S>() {
			Some(state) => {
				*state = reducer(state, action);
				true
			}
			None => false,
		});
		Ok((state, Dispatch { handle: set_state.handle, reduce }))
	}

	/// Recomputes the value only when `deps` changed.
	///
	/// # Errors
	///
	/// See [`use_state`](`Hooks::use_state`).
	pub fn use_memo<T, D>(&mut self, deps: D, compute: impl FnOnce(&D) -> T) -> Result<T, Error>
	where
		T: Clone + 'static,
		D: PartialEq + 'static,
	{
		let ordinal = self.claim("use_memo")?;
		let cached = match self.store.slots.borrow().get(ordinal) {
			None => None,
			Some(HookSlot::Memo { value, deps: previous }) => {
				let previous = previous.downcast_ref::<D>().ok_or_else(|| violation(ordinal, "use_memo", OTHER_TYPE))?;
				if *previous == deps {
					Some(value.downcast_ref::<T>().cloned().ok_or_else(|| violation(ordinal, "use_memo", OTHER_TYPE))?)
				} else {
					None
				}
			}
			Some(other) => return Err(violation(ordinal, "use_memo", other.name())),
		};
		if let Some(value) = cached {
			return Ok(value);
		}

		let value = compute(&deps);
		self.store_slot(ordinal, HookSlot::Memo { value: Box::new(value.clone()), deps: Box::new(deps) });
		Ok(value)
	}

	/// Returns the previously stored `callback` unless `deps` changed.
	///
	/// # Errors
	///
	/// See [`use_state`](`Hooks::use_state`).
	pub fn use_callback<F, D>(&mut self, deps: D, callback: F) -> Result<F, Error>
	where
		F: Clone + 'static,
		D: PartialEq + 'static,
	{
		let ordinal = self.claim("use_callback")?;
		let cached = match self.store.slots.borrow().get(ordinal) {
			None => None,
			Some(HookSlot::Callback { callback, deps: previous }) => {
				let previous = previous.downcast_ref::<D>().ok_or_else(|| violation(ordinal, "use_callback", OTHER_TYPE))?;
				if *previous == deps {
					Some(callback.downcast_ref::<F>().cloned().ok_or_else(|| violation(ordinal, "use_callback", OTHER_TYPE))?)
				} else {
					None
				}
			}
			Some(other) => return Err(violation(ordinal, "use_callback", other.name())),
		};
		if let Some(callback) = cached {
			return Ok(callback);
		}

		self.store_slot(ordinal, HookSlot::Callback { callback: Box::new(callback.clone()), deps: Box::new(deps) });
		Ok(callback)
	}

	fn store_slot(&self, ordinal: usize, slot: HookSlot) {
		let mut slots = self.store.slots.borrow_mut();
		if ordinal == slots.len() {
			slots.push(slot);
		} else {
			slots[ordinal] = slot;
		}
	}

	/// Runs `effect` after every render, once the host [flushes effects](`crate::Root::flush_effects`).
	///
	/// # Errors
	///
	/// See [`use_state`](`Hooks::use_state`).
	pub fn use_effect(&mut self, effect: impl FnOnce() -> Option<Cleanup> + 'static) -> Result<(), Error> {
		self.effect::<()>(EffectKind::Passive, None, effect)
	}

	/// Runs `effect` after the first render and whenever `deps` changed.
	///
	/// # Errors
	///
	/// See [`use_state`](`Hooks::use_state`).
	pub fn use_effect_with<D: PartialEq + 'static>(&mut self, deps: D, effect: impl FnOnce() -> Option<Cleanup> + 'static) -> Result<(), Error> {
		self.effect(EffectKind::Passive, Some(deps), effect)
	}

	/// Like [`use_effect`](`Hooks::use_effect`), but runs before the update that rendered it returns.
	///
	/// # Errors
	///
	/// See [`use_state`](`Hooks::use_state`).
	pub fn use_layout_effect(&mut self, effect: impl FnOnce() -> Option<Cleanup> + 'static) -> Result<(), Error> {
		self.effect::<()>(EffectKind::Layout, None, effect)
	}

	/// # Errors
	///
	/// See [`use_state`](`Hooks::use_state`).
	pub fn use_layout_effect_with<D: PartialEq + 'static>(&mut self, deps: D, effect: impl FnOnce() -> Option<Cleanup> + 'static) -> Result<(), Error> {
		self.effect(EffectKind::Layout, Some(deps), effect)
	}

	fn effect<D: PartialEq + 'static>(&mut self, kind: EffectKind, deps: Option<D>, body: impl FnOnce() -> Option<Cleanup> + 'static) -> Result<(), Error> {
		let name = kind.hook_name();
		let ordinal = self.claim(name)?;

		let cleanup = {
			let mut slots = self.store.slots.borrow_mut();
			match slots.get_mut(ordinal) {
				None => {
					let cleanup = CleanupCell::default();
					slots.push(HookSlot::Effect {
						kind,
						deps: deps.map(|deps| Box::new(deps) as Box<dyn Any>),
						cleanup: Rc::clone(&cleanup),
					});
					cleanup
				}
				Some(HookSlot::Effect { kind: previous_kind, deps: previous, cleanup }) if *previous_kind == kind => {
					if let (Some(deps), Some(previous)) = (&deps, previous.as_ref()) {
						let previous = previous.downcast_ref::<D>().ok_or_else(|| violation(ordinal, name, OTHER_TYPE))?;
						if previous == deps {
							return Ok(());
						}
					}
					*previous = deps.map(|deps| Box::new(deps) as Box<dyn Any>);
					Rc::clone(cleanup)
				}
				Some(other) => return Err(violation(ordinal, name, other.name())),
			}
		};

		self.runtime.schedule_effect(
			kind,
			Box::new(move || {
				let previous = cleanup.borrow_mut().take();
				if let Some(previous) = previous {
					previous();
				}
				let next = body();
				*cleanup.borrow_mut() = next;
			}),
		);
		Ok(())
	}

	/// A mutable cell that persists across renders. Writing to it does not cause a re-render.
	///
	/// # Errors
	///
	/// See [`use_state`](`Hooks::use_state`).
	pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Result<Rc<RefCell<T>>, Error> {
		let ordinal = self.claim("use_ref")?;
		if ordinal == self.store.slots.borrow().len() {
			let cell = Rc::new(RefCell::new(init()));
			self.store.slots.borrow_mut().push(HookSlot::Ref(Box::new(cell)));
		}

		match &self.store.slots.borrow()[ordinal] {
			HookSlot::Ref(cell) => cell.downcast_ref::<Rc<RefCell<T>>>().cloned().ok_or_else(|| violation(ordinal, "use_ref", OTHER_TYPE)),
			other => Err(violation(ordinal, "use_ref", other.name())),
		}
	}

	/// The value written by the nearest [provider](`crate::VNode::provider`) rendered so far, or the context's default.
	#[must_use]
	pub fn use_context(&self, context: &Context) -> Value {
		context.get()
	}
}

struct SlotHandle {
	store: Weak<HookStore>,
	runtime: Weak<Runtime>,
	ordinal: usize,
}

impl SlotHandle {
	/// Applies `update` to the state slot and schedules a re-render of the root.
	fn modify(&self, update: impl FnOnce(&mut Box<dyn Any>) -> bool) -> Result<(), Error> {
		let store = match self.store.upgrade() {
			Some(store) => store,
			None => {
				trace!("Dropping state update of an unmounted function component.");
				return Ok(());
			}
		};

		let applied = match store.slots.borrow_mut().get_mut(self.ordinal) {
			Some(HookSlot::State(value)) => update(value),
			_ => false,
		};
		if !applied {
			return Err(violation(self.ordinal, "use_state", OTHER_TYPE));
		}

		store.dirty.set(true);
		mem::drop(store);
		match self.runtime.upgrade() {
			Some(runtime) => runtime.perform(Work::Root),
			None => Ok(()),
		}
	}
}

/// Setter returned by [`Hooks::use_state`].
pub struct SetState<T> {
	handle: SlotHandle,
	marker: PhantomData<fn(T)>,
}

impl<T: 'static> SetState<T> {
	/// # Errors
	///
	/// If the resulting re-render runs synchronously, its errors are returned here.
	pub fn set(&self, value: T) -> Result<(), Error> {
		self.update(move |_| value)
	}

	/// # Errors
	///
	/// See [`set`](`SetState::set`).
	pub fn update(&self, update: impl FnOnce(&T) -> T) -> Result<(), Error> {
		self.handle.modify(move |slot| match slot.downcast_mut::<T>() {
			Some(value) => {
				*value = update(value);
				true
			}
			None => false,
		})
	}
}

impl<T> Clone for SetState<T> {
	fn clone(&self) -> Self {
		Self {
			handle: SlotHandle {
				store: self.handle.store.clone(),
				runtime: self.handle.runtime.clone(),
				ordinal: self.handle.ordinal,
			},
			marker: PhantomData,
		}
	}
}

impl<T> Debug for SetState<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("SetState").field("ordinal", &self.handle.ordinal).finish()
	}
}

/// Dispatcher returned by [`Hooks::use_reducer`].
pub struct Dispatch<A> {
	handle: SlotHandle,
	reduce: Rc<dyn Fn(&mut Box<dyn Any>, A) -> bool>,
}

impl<A: 'static> Dispatch<A> {
	/// # Errors
	///
	/// If the resulting re-render runs synchronously, its errors are returned here.
	pub fn dispatch(&self, action: A) -> Result<(), Error> {
		let reduce = Rc::clone(&self.reduce);
		self.handle.modify(move |slot| reduce(slot, action))
	}
}

impl<A> Clone for Dispatch<A> {
	fn clone(&self) -> Self {
		Self {
			handle: SlotHandle {
				store: self.handle.store.clone(),
				runtime: self.handle.runtime.clone(),
				ordinal: self.handle.ordinal,
			},
			reduce: Rc::clone(&self.reduce),
		}
	}
}

impl<A> Debug for Dispatch<A> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dispatch").field("ordinal", &self.handle.ordinal).finish()
	}
}
