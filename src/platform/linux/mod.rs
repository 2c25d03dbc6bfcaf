/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2024 The Clipowner contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

use crate::common::Error;

mod x11;
pub use x11::{X11Selection, X11Waker};

fn into_unknown<E: std::fmt::Display>(context: &str, error: E) -> Error {
	Error::Unknown { description: format!("{context}: {error}") }
}
