use std::{
	borrow::Cow,
	fmt,
	path::{Path, PathBuf},
	sync::Arc,
	time::SystemTime,
};

use chrono::{DateTime, Local};
use indexmap::IndexMap;

use crate::{common::Error, url::encode_uri_list, ContentFormat};

/// The literal timestamp peers have been receiving for file selections.
pub const DEFAULT_TIMESTAMP: &str = "2025-1-1:10-10-10";

const TIMESTAMP_FORMAT: &str = "%Y-%-m-%-d:%H-%M-%S";

/// Renders the bytes of one format when a peer asks for it.
///
/// Producers run on the thread serving the selection, so they have to return
/// quickly and must not block.
pub type Producer = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;

/// Data that can be placed on a selection, in one or more formats.
///
/// Each format is bound to a [`Producer`] that is only invoked once a peer
/// actually requests that format.
#[derive(Clone)]
pub struct ContentSource {
	label: Cow<'static, str>,
	values: IndexMap<ContentFormat, Producer>,
}

impl ContentSource {
	/// Creates a source without any formats. The label only shows up in logs.
	pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
		Self { label: label.into(), values: IndexMap::new() }
	}

	/// Binds `format` to a producer that is invoked on every request.
	///
	/// Binding a format twice replaces the earlier producer.
	pub fn with<F>(mut self, format: ContentFormat, producer: F) -> Self
	where
		F: Fn() -> Vec<u8> + Send + Sync + 'static,
	{
		self.values.insert(format, Arc::new(producer));
		self
	}

	/// Binds `format` to bytes that are already known.
	pub fn with_value(self, format: ContentFormat, value: impl Into<Vec<u8>>) -> Self {
		let value = value.into();
		self.with(format, move || value.clone())
	}

	/// Offers a list of files as URIs, as a GNOME copy payload and with a
	/// timestamp chosen by `policy`.
	///
	/// Everything except the producers' output is captured here, so serving a
	/// request never touches the file system.
	pub fn files<P: AsRef<Path>>(paths: &[P], policy: &TimestampPolicy) -> Result<Self, Error> {
		let uri_list = encode_uri_list(paths);
		// needed by nautilus and friends to tell a copy from a cut
		let gnome_copied_files =
			if uri_list.is_empty() { String::new() } else { format!("copy\n{uri_list}") };
		let timestamp = policy.render(paths)?;

		let label = match paths {
			[] => Cow::Borrowed("files"),
			[path] => Cow::Owned(format!("file {}", path.as_ref().display())),
			_ => Cow::Owned(format!("{} files", paths.len())),
		};

		Ok(Self::new(label)
			.with_value(ContentFormat::Timestamp, timestamp)
			.with_value(ContentFormat::UriList, uri_list)
			.with_value(ContentFormat::GnomeCopiedFiles, gnome_copied_files))
	}

	/// Offers `text` as plain text.
	pub fn text(text: impl Into<String>) -> Self {
		let text: String = text.into();
		Self::new("text").with_value(ContentFormat::PlainText, text)
	}

	/// Additionally offers `html` as formatted text.
	pub fn with_html(self, html: impl Into<String>) -> Self {
		let html: String = html.into();
		self.with_value(ContentFormat::FormattedText, html)
	}

	/// The label given on construction.
	pub fn label(&self) -> &str {
		&self.label
	}

	/// The formats this source can produce, in the order they were bound.
	pub fn formats(&self) -> impl Iterator<Item = ContentFormat> + '_ {
		self.values.keys().copied()
	}

	/// Whether this source has a producer for `format`.
	pub fn offers(&self, format: ContentFormat) -> bool {
		self.values.contains_key(&format)
	}

	/// Renders `format`.
	///
	/// Fails with [`Error::Lookup`] if `format` was never bound.
	pub fn value(&self, format: ContentFormat) -> Result<Vec<u8>, Error> {
		let producer = self.values.get(&format).ok_or(Error::Lookup { format })?;
		Ok(producer())
	}
}

impl fmt::Debug for ContentSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContentSource")
			.field("label", &self.label)
			.field("formats", &self.values.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// How the `TIMESTAMP` value of a file source is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampPolicy {
	/// Always offer the same literal value.
	Fixed(String),
	/// Offer the latest modification time among the files, in local time.
	LastModified,
}

impl Default for TimestampPolicy {
	fn default() -> Self {
		TimestampPolicy::Fixed(DEFAULT_TIMESTAMP.to_owned())
	}
}

impl TimestampPolicy {
	fn render<P: AsRef<Path>>(&self, paths: &[P]) -> Result<String, Error> {
		match self {
			TimestampPolicy::Fixed(value) => Ok(value.clone()),
			TimestampPolicy::LastModified => {
				let mut latest: Option<SystemTime> = None;
				for path in paths {
					let modified = modified_time(path.as_ref())?;
					latest = Some(latest.map_or(modified, |t| t.max(modified)));
				}
				Ok(latest.map(format_timestamp).unwrap_or_default())
			}
		}
	}
}

fn modified_time(path: &Path) -> Result<SystemTime, Error> {
	let into_io = |source| Error::Io { path: PathBuf::from(path), source };
	std::fs::metadata(path).and_then(|meta| meta.modified()).map_err(into_io)
}

fn format_timestamp(time: SystemTime) -> String {
	DateTime::<Local>::from(time).format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[test]
	fn file_source_formats() {
		let source = ContentSource::files(&["a.txt", "b.txt"], &TimestampPolicy::default()).unwrap();
		assert_eq!(
			source.formats().collect::<Vec<_>>(),
			[ContentFormat::Timestamp, ContentFormat::UriList, ContentFormat::GnomeCopiedFiles]
		);
		assert_eq!(source.value(ContentFormat::UriList).unwrap(), b"file://a.txt\nfile://b.txt");
		assert_eq!(
			source.value(ContentFormat::GnomeCopiedFiles).unwrap(),
			b"copy\nfile://a.txt\nfile://b.txt"
		);
		assert_eq!(source.value(ContentFormat::Timestamp).unwrap(), DEFAULT_TIMESTAMP.as_bytes());
		assert_eq!(source.label(), "2 files");
	}

	#[test]
	fn single_file() {
		let source = ContentSource::files(&["test.txt"], &TimestampPolicy::default()).unwrap();
		assert_eq!(source.value(ContentFormat::UriList).unwrap(), b"file://test.txt");
	}

	#[test]
	fn no_files_give_empty_values() {
		let source = ContentSource::files::<&str>(&[], &TimestampPolicy::LastModified).unwrap();
		assert_eq!(source.value(ContentFormat::UriList).unwrap(), b"");
		assert_eq!(source.value(ContentFormat::GnomeCopiedFiles).unwrap(), b"");
		assert_eq!(source.value(ContentFormat::Timestamp).unwrap(), b"");
	}

	#[test]
	fn unbound_format_is_a_lookup_failure() {
		let source = ContentSource::text("hello");
		assert!(matches!(
			source.value(ContentFormat::UriList),
			Err(Error::Lookup { format: ContentFormat::UriList })
		));
		assert!(!source.offers(ContentFormat::FormattedText));
		assert!(source.with_html("<b>hello</b>").offers(ContentFormat::FormattedText));
	}

	#[test]
	fn producers_run_on_every_request() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let source = ContentSource::new("counter").with(ContentFormat::PlainText, move || {
			counter.fetch_add(1, Ordering::SeqCst).to_string().into_bytes()
		});
		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert_eq!(source.value(ContentFormat::PlainText).unwrap(), b"0");
		assert_eq!(source.value(ContentFormat::PlainText).unwrap(), b"1");
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn last_modified_of_missing_file() {
		let err = ContentSource::files(&["/nonexistent/clipowner"], &TimestampPolicy::LastModified)
			.unwrap_err();
		assert!(matches!(err, Error::Io { .. }));
	}

	#[test]
	fn last_modified_of_existing_file() {
		let path = std::env::current_exe().unwrap();
		let source = ContentSource::files(&[&path], &TimestampPolicy::LastModified).unwrap();
		let expected = format_timestamp(std::fs::metadata(&path).unwrap().modified().unwrap());
		assert_eq!(source.value(ContentFormat::Timestamp).unwrap(), expected.into_bytes());
	}
}
