use crate::vnode::Key;
use core::fmt::{self, Display, Formatter};

/// Everything that can go wrong while mounting or updating a tree.
///
/// Failures of the [`TargetTree`](`crate::TargetTree`) itself are not represented here:
/// adapters log and skip them, the same way a failed DOM call is logged and skipped.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
	/// Two siblings in one child list carry the same explicit [`Key`].
	DuplicateKey { key: Key },
	/// A function component called its hooks in a different order (or a different number of them) than during its previous render.
	HookOrderViolation { ordinal: usize, expected: &'static str, found: &'static str },
	/// [`Root::render`](`crate::Root::render`) was called on a root that already has a mounted tree.
	AlreadyMounted,
	/// The operation needs a mounted tree, but there is none.
	NotMounted,
	/// Realizing or updating the tree recursed deeper than [`Options::depth_limit`](`crate::Options::depth_limit`).
	DepthLimitExceeded { limit: usize },
	/// Updates kept scheduling further updates for more than [`Options::update_limit`](`crate::Options::update_limit`) rounds.
	UpdateLimitExceeded { limit: usize },
	/// Returned by component code (render functions, lifecycle methods).
	Component(Box<dyn std::error::Error + 'static>),
}

impl Error {
	/// Wraps an error raised by component code so that it can be returned from a render function or lifecycle method.
	pub fn component(error: impl std::error::Error + 'static) -> Self {
		Self::Component(Box::new(error))
	}
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Error::DuplicateKey { key } => write!(f, "duplicate key {} within one child list", key),
			Error::HookOrderViolation { ordinal, expected, found } => {
				write!(f, "hook order violation at ordinal {}: expected {} but found {}", ordinal, expected, found)
			}
			Error::AlreadyMounted => f.write_str("a tree is already mounted on this root"),
			Error::NotMounted => f.write_str("no tree is mounted on this root"),
			Error::DepthLimitExceeded { limit } => write!(f, "tree depth limit ({}) exceeded", limit),
			Error::UpdateLimitExceeded { limit } => write!(f, "updates kept causing updates for more than {} rounds", limit),
			Error::Component(error) => Display::fmt(error, f),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Component(error) => Some(error.as_ref()),
			_ => None,
		}
	}
}
