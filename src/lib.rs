#![doc(html_root_url = "https://docs.rs/reconcile-dom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! A retained-mode virtual DOM reconciler.
//!
//! Describe the desired tree as [`VNode`]s, mount it through a [`Root`] and let class components ([`Component`])
//! and function components ([`FunctionComponent`] with [`Hooks`]) update it. Changes are applied to a [`TargetTree`]:
//! the browser DOM through [`web::WebTree`], or an in-memory tree through [`memory::MemoryTree`].
//!
//! # Threading
//!
//! Everything here is single-threaded: [`Root`] and all handles are `!Send`.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod component;
mod error;
mod hooks;
pub mod memory;
mod rc_hash_map;
mod reconcile;
mod root;
mod scheduler;
pub mod store;
mod target;
mod vnode;
pub mod web;

pub use component::{Component, ComponentClass, DeriveState, Scope};
pub use error::Error;
pub use hooks::{Cleanup, Dispatch, ForwardRef, FunctionComponent, Hooks, Memo, SetState};
pub use root::{render, Options, Root};
pub use scheduler::{StateDelta, Updater};
pub use target::{EventHandler, NodeId, TargetTree};
pub use vnode::{map, shallow_equal, Consumer, Context, Key, Kind, Map, NodeRef, Props, RefValue, RenderProp, State, Style, VNode, Value};
