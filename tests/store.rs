use reconcile_dom::{
	map,
	store::{bind_action_creators, combine_reducers, Reducer, Store},
	FunctionComponent, Map, VNode, Value,
};
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};
use tracing_test::traced_test;

mod stage_;
use stage_::Stage;

#[derive(Debug, Clone, PartialEq)]
enum Action {
	Init,
	Increment,
	Add(i64),
	Rename(&'static str),
}

fn counter(state: &i64, action: &Action) -> i64 {
	match action {
		Action::Increment => state + 1,
		Action::Add(n) => state + n,
		_ => *state,
	}
}

#[test]
fn dispatch_notifies_subscribers_in_order() {
	let store = Store::new(counter, 0);
	let log = Rc::new(RefCell::new(Vec::new()));

	let first = {
		let (observed, log) = (store.clone(), Rc::clone(&log));
		store.subscribe(move || log.borrow_mut().push(format!("first {}", observed.state())))
	};
	let second = {
		let log = Rc::clone(&log);
		store.subscribe(move || log.borrow_mut().push("second".to_owned()))
	};

	store.dispatch(Action::Increment);
	store.dispatch(Action::Add(5));
	assert_eq!(store.state(), 6);
	assert_eq!(*log.borrow(), ["first 1", "second", "first 6", "second"]);

	first.unsubscribe();
	log.borrow_mut().clear();
	store.dispatch(Action::Increment);
	assert_eq!(*log.borrow(), ["second"]);

	second.unsubscribe();
	store.dispatch(Action::Increment);
	assert_eq!(log.borrow().len(), 1);
	assert_eq!(store.state(), 8);
}

#[test]
fn init_action_fills_in_defaults() {
	let store = Store::with_init(
		|state: &Option<i64>, action: &Action| match action {
			Action::Init => Some(state.unwrap_or(42)),
			_ => *state,
		},
		None,
		Action::Init,
	);
	assert_eq!(store.state(), Some(42));
}

#[test]
fn combined_reducers_own_their_slices() {
	let count: Reducer<Value, Action> = Rc::new(|state: &Value, action: &Action| {
		let state = state.as_int().unwrap_or_default();
		Value::Int(match action {
			Action::Increment => state + 1,
			_ => state,
		})
	});
	let name: Reducer<Value, Action> = Rc::new(|state: &Value, action: &Action| match action {
		Action::Rename(name) => Value::from(*name),
		Action::Init => Value::from(state.as_str().unwrap_or("anonymous")),
		_ => state.clone(),
	});

	let store = Store::with_init(combine_reducers([("count", count), ("name", name)]), map([("stale", 1)]), Action::Init);
	assert_eq!(store.state(), map([("count", Value::Int(0)), ("name", Value::from("anonymous"))]));

	store.dispatch(Action::Increment);
	store.dispatch(Action::Rename("Ann"));
	let state: Map = store.state();
	assert_eq!(state.get("count"), Some(&Value::Int(1)));
	assert_eq!(state.get("name").and_then(Value::as_str), Some("Ann"));
	assert_eq!(state.keys().collect::<Vec<_>>(), ["count", "name"]);
}

#[test]
fn bound_action_creators_dispatch() {
	let store = Store::new(counter, 0);
	let add: Rc<dyn Fn(i64) -> Action> = Rc::new(Action::Add);
	let double_add: Rc<dyn Fn(i64) -> Action> = Rc::new(|n| Action::Add(n * 2));

	let bound = bind_action_creators([("add", add), ("double_add", double_add)], &store.dispatcher());
	assert_eq!(bound.keys().copied().collect::<Vec<_>>(), ["add", "double_add"]);

	bound["add"](3);
	bound["double_add"](3);
	assert_eq!(store.state(), 9);
}

#[test]
fn dispatchers_do_not_keep_the_store_alive() {
	let store = Store::new(counter, 0);
	let dispatch = store.dispatcher();
	dispatch(Action::Increment);
	assert_eq!(store.state(), 1);

	drop(store);
	dispatch(Action::Increment);
}

#[test]
#[traced_test]
fn reducers_may_not_dispatch() {
	let dispatch: Rc<RefCell<Option<Rc<dyn Fn(Action)>>>> = Rc::default();
	let store = {
		let dispatch = Rc::clone(&dispatch);
		Store::new(
			move |state: &i64, action: &Action| {
				if let Some(dispatch) = dispatch.borrow().as_ref() {
					dispatch(Action::Add(100));
				}
				counter(state, action)
			},
			0,
		)
	};
	*dispatch.borrow_mut() = Some(store.dispatcher());

	store.dispatch(Action::Increment);
	assert_eq!(store.state(), 1);
	assert!(logs_contain("Reducers may not dispatch actions"));
}

#[test]
fn subscribers_can_drive_rerenders() {
	let store = Store::new(counter, 0);
	let renders = Rc::new(Cell::new(0));
	let view = {
		let (store, renders) = (store.clone(), Rc::clone(&renders));
		FunctionComponent::new("Connected", move |_, _| {
			renders.set(renders.get() + 1);
			Ok(VNode::text(store.state().to_string()))
		})
	};

	let stage = Stage::new(VNode::function(&view));
	let _subscription = {
		let root = stage.root.clone();
		store.subscribe(move || root.request_render().unwrap())
	};

	store.dispatch(Action::Add(7));
	assert_eq!(stage.html(), "7");
	assert_eq!(renders.get(), 2);
}
