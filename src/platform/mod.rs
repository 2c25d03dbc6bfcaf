#[cfg(all(
	unix,
	not(any(target_os = "macos", target_os = "android", target_os = "emscripten")),
))]
mod linux;
#[cfg(all(
	unix,
	not(any(target_os = "macos", target_os = "android", target_os = "emscripten")),
))]
pub use linux::*;

mod mock;
pub use mock::MockSelection;

use std::fmt;

/// The X11 selection to own.
///
/// See the [X11 clipboard explanation](https://www.uninformativ.de/blog/postings/2017-04-02/0/POSTING-en.html)
/// for how the three selections differ.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinuxClipboardKind {
	/// Typically used selection for explicit cut/copy/paste actions (ie. windows/macos like clipboard behavior)
	#[default]
	Clipboard,

	/// Typically used for mouse selections and/or currently selected text. Accessible via middle mouse click.
	Primary,

	/// The secondary clipboard is rarely used but theoretically available on X11.
	Secondary,
}

impl LinuxClipboardKind {
	pub const fn atom_name(&self) -> &'static str {
		match self {
			LinuxClipboardKind::Clipboard => "CLIPBOARD",
			LinuxClipboardKind::Primary => "PRIMARY",
			LinuxClipboardKind::Secondary => "SECONDARY",
		}
	}
}

impl fmt::Display for LinuxClipboardKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.atom_name())
	}
}
