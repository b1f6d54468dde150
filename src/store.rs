//! A minimal predictable state container: one reducer, one state, any number of subscribers.
//!
//! Subscribers are plain callbacks. To re-render on changes, call [`Root::request_render`](`crate::Root::request_render`)
//! or a [`SetState`](`crate::SetState`) from within one.

use crate::vnode::{Map, Value};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use indexmap::IndexMap;
use std::rc::{Rc, Weak};
use tracing::{error, trace};

/// Computes the next state from the current one and an action.
pub type Reducer<S, A> = Rc<dyn Fn(&S, &A) -> S>;

type Listener = Rc<dyn Fn()>;

struct StoreState<S, A> {
	reducer: Box<dyn Fn(&S, &A) -> S>,
	state: RefCell<S>,
	listeners: RefCell<Vec<(usize, Listener)>>,
	next_listener: Cell<usize>,
	dispatching: Cell<bool>,
}

/// Shared handle to one state container.
pub struct Store<S, A>(Rc<StoreState<S, A>>);

impl<S, A> Clone for Store<S, A> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<S: Clone + 'static, A: 'static> Store<S, A> {
	pub fn new(reducer: impl Fn(&S, &A) -> S + 'static, preloaded: S) -> Self {
		Self(Rc::new(StoreState {
			reducer: Box::new(reducer),
			state: RefCell::new(preloaded),
			listeners: RefCell::default(),
			next_listener: Cell::new(0),
			dispatching: Cell::new(false),
		}))
	}

	/// Like [`new`](`Store::new`), then dispatches `init` so that reducers can fill in their defaults.
	pub fn with_init(reducer: impl Fn(&S, &A) -> S + 'static, preloaded: S, init: A) -> Self {
		let store = Self::new(reducer, preloaded);
		store.dispatch(init);
		store
	}

	#[must_use]
	pub fn state(&self) -> S {
		self.0.state.borrow().clone()
	}

	/// Replaces the state with the reducer's result, then notifies all current subscribers in subscription order.
	///
	/// Reducers must not dispatch. Such actions are logged and dropped.
	pub fn dispatch(&self, action: A) {
		if self.0.dispatching.replace(true) {
			return error!("Reducers may not dispatch actions; dropping the action.");
		}
		let next = {
			let state = self.0.state.borrow();
			(self.0.reducer)(&state, &action)
		};
		*self.0.state.borrow_mut() = next;
		self.0.dispatching.set(false);

		let listeners: Vec<Listener> = self.0.listeners.borrow().iter().map(|(_, listener)| Rc::clone(listener)).collect();
		trace!("Notifying {} subscriber(s).", listeners.len());
		for listener in listeners {
			listener();
		}
	}

	/// Calls `listener` after every dispatch until the returned [`Subscription`] is [unsubscribed](`Subscription::unsubscribe`).
	pub fn subscribe(&self, listener: impl Fn() + 'static) -> Subscription {
		let id = self.0.next_listener.get();
		self.0.next_listener.set(id + 1);
		self.0.listeners.borrow_mut().push((id, Rc::new(listener)));

		let store: Weak<StoreState<S, A>> = Rc::downgrade(&self.0);
		Subscription(Some(Box::new(move || {
			if let Some(store) = store.upgrade() {
				store.listeners.borrow_mut().retain(|(listener, _)| *listener != id);
			}
		})))
	}

	/// A dispatch function that doesn't keep the store alive.
	#[must_use]
	pub fn dispatcher(&self) -> Rc<dyn Fn(A)> {
		let store = Rc::downgrade(&self.0);
		Rc::new(move |action: A| match store.upgrade() {
			Some(store) => Store(store).dispatch(action),
			None => trace!("Dropping action: the store is gone."),
		})
	}
}

impl<S: Debug, A> Debug for Store<S, A> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Store")
			.field("state", &self.0.state.borrow())
			.field("listeners", &self.0.listeners.borrow().len())
			.finish()
	}
}

/// Returned by [`Store::subscribe`]. Dropping it keeps the subscription.
#[must_use = "Dropping a `Subscription` does not unsubscribe."]
pub struct Subscription(Option<Box<dyn FnOnce()>>);

impl Subscription {
	pub fn unsubscribe(mut self) {
		if let Some(unsubscribe) = self.0.take() {
			unsubscribe();
		}
	}
}

impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("Subscription")
	}
}

/// Combines reducers for separate slices of a [`Map`] state into one.
///
/// Each reducer receives its slice ([`Value::Null`] if absent) and the result replaces that slice.
/// Slices without a reducer are dropped.
pub fn combine_reducers<A: 'static>(reducers: impl IntoIterator<Item = (&'static str, Reducer<Value, A>)>) -> impl Fn(&Map, &A) -> Map + 'static {
	let reducers: Vec<_> = reducers.into_iter().collect();
	move |state: &Map, action: &A| -> Map {
		reducers
			.iter()
			.map(|(name, reducer)| {
				let slice = state.get(*name).cloned().unwrap_or(Value::Null);
				((*name).into(), reducer(&slice, action))
			})
			.collect()
	}
}

/// Turns an action creator into a function that creates and dispatches in one go.
pub fn bind_action_creator<Args: 'static, A: 'static>(creator: impl Fn(Args) -> A + 'static, dispatch: Rc<dyn Fn(A)>) -> Rc<dyn Fn(Args)> {
	Rc::new(move |args: Args| dispatch(creator(args)))
}

/// [`bind_action_creator`] for a whole set of named creators.
pub fn bind_action_creators<Args: 'static, A: 'static>(
	creators: impl IntoIterator<Item = (&'static str, Rc<dyn Fn(Args) -> A>)>,
	dispatch: &Rc<dyn Fn(A)>,
) -> IndexMap<&'static str, Rc<dyn Fn(Args)>> {
	creators
		.into_iter()
		.map(|(name, creator)| (name, bind_action_creator(move |args| creator(args), Rc::clone(dispatch))))
		.collect()
}
