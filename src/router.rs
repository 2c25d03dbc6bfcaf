use indexmap::{IndexMap, IndexSet};

use crate::{common::Error, ContentFormat, ContentSource};

/// The formats that will be advertised, each bound to exactly one source.
///
/// Built once by [`resolve`] before ownership is claimed and never changed
/// afterwards.
#[derive(Debug, Clone)]
pub struct ResolvedOffer {
	sources: Vec<ContentSource>,
	bindings: IndexMap<ContentFormat, usize>,
}

impl ResolvedOffer {
	/// The advertised formats, in the order they were bound.
	pub fn formats(&self) -> impl Iterator<Item = ContentFormat> + '_ {
		self.bindings.keys().copied()
	}

	/// Whether `format` is advertised.
	pub fn contains(&self, format: ContentFormat) -> bool {
		self.bindings.contains_key(&format)
	}

	/// The source that answers requests for `format`.
	pub fn source_for(&self, format: ContentFormat) -> Option<&ContentSource> {
		self.bindings.get(&format).map(|&index| &self.sources[index])
	}

	/// Renders `format` through its bound source.
	pub fn render(&self, format: ContentFormat) -> Result<Vec<u8>, Error> {
		self.source_for(format).ok_or(Error::Lookup { format })?.value(format)
	}

	/// Whether no format is advertised at all.
	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}

	/// The number of advertised formats.
	pub fn len(&self) -> usize {
		self.bindings.len()
	}
}

/// Every format offered by at least one of `sources`, first occurrence first.
pub fn available_formats(sources: &[ContentSource]) -> Vec<ContentFormat> {
	sources.iter().flat_map(ContentSource::formats).collect::<IndexSet<_>>().into_iter().collect()
}

/// Binds every requested format to the first source in `sources` offering it.
///
/// An empty `requested` list stands for every format any source offers.
/// If a requested format has no source, resolution fails with
/// [`Error::UnresolvedTargets`] listing exactly the formats left unbound.
pub fn resolve(
	requested: &[ContentFormat],
	sources: Vec<ContentSource>,
) -> Result<ResolvedOffer, Error> {
	let requested = if requested.is_empty() {
		available_formats(&sources)
	} else {
		requested.iter().copied().collect::<IndexSet<_>>().into_iter().collect()
	};

	let mut bindings = IndexMap::with_capacity(requested.len());
	let mut lost = Vec::new();
	for format in requested {
		match sources.iter().position(|source| source.offers(format)) {
			Some(index) => {
				log::debug!("serving {} from {}", format, sources[index].label());
				bindings.insert(format, index);
			}
			None => lost.push(format),
		}
	}

	if !lost.is_empty() {
		log::error!("Got clipboard format(s) without a source for their value: {:?}", lost);
		return Err(Error::UnresolvedTargets { formats: lost });
	}

	Ok(ResolvedOffer { sources, bindings })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn source(label: &'static str, formats: &[ContentFormat]) -> ContentSource {
		formats
			.iter()
			.fold(ContentSource::new(label), |source, &format| source.with_value(format, label))
	}

	fn bound_label(offer: &ResolvedOffer, format: ContentFormat) -> &str {
		offer.source_for(format).unwrap().label()
	}

	#[test]
	fn requested_subset() {
		let sources = vec![
			source("first", &[ContentFormat::UriList, ContentFormat::Timestamp]),
			source("second", &[ContentFormat::PlainText, ContentFormat::UriList]),
		];
		let offer = resolve(&[ContentFormat::PlainText, ContentFormat::UriList], sources).unwrap();
		assert_eq!(
			offer.formats().collect::<Vec<_>>(),
			[ContentFormat::PlainText, ContentFormat::UriList]
		);
		assert_eq!(bound_label(&offer, ContentFormat::PlainText), "second");
		assert_eq!(bound_label(&offer, ContentFormat::UriList), "first");
		assert!(!offer.contains(ContentFormat::Timestamp));
		assert_eq!(offer.render(ContentFormat::PlainText).unwrap(), b"second");
	}

	#[test]
	fn first_source_wins() {
		let sources = vec![
			source("first", &[ContentFormat::Timestamp]),
			source("second", &[ContentFormat::Timestamp]),
		];
		let offer = resolve(&[ContentFormat::Timestamp], sources).unwrap();
		assert_eq!(bound_label(&offer, ContentFormat::Timestamp), "first");
	}

	#[test]
	fn empty_request_offers_union() {
		let sources = vec![
			source("first", &[ContentFormat::UriList, ContentFormat::Timestamp]),
			source("second", &[ContentFormat::Timestamp, ContentFormat::PlainText]),
		];
		let offer = resolve(&[], sources).unwrap();
		assert_eq!(
			offer.formats().collect::<Vec<_>>(),
			[ContentFormat::UriList, ContentFormat::Timestamp, ContentFormat::PlainText]
		);
		assert_eq!(bound_label(&offer, ContentFormat::Timestamp), "first");
		assert_eq!(bound_label(&offer, ContentFormat::PlainText), "second");
	}

	#[test]
	fn unresolved_formats_are_reported() {
		let sources = vec![source("files", &[ContentFormat::UriList])];
		let err = resolve(
			&[ContentFormat::FormattedText, ContentFormat::UriList, ContentFormat::PlainText],
			sources,
		)
		.unwrap_err();
		match err {
			Error::UnresolvedTargets { formats } => {
				assert_eq!(formats, [ContentFormat::FormattedText, ContentFormat::PlainText])
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn no_sources() {
		let offer = resolve(&[], Vec::new()).unwrap();
		assert!(offer.is_empty());
		assert!(matches!(
			resolve(&[ContentFormat::PlainText], Vec::new()),
			Err(Error::UnresolvedTargets { .. })
		));
	}

	#[test]
	fn duplicate_requests_are_advertised_once() {
		let sources = vec![source("text", &[ContentFormat::PlainText])];
		let offer = resolve(&[ContentFormat::PlainText, ContentFormat::PlainText], sources).unwrap();
		assert_eq!(offer.len(), 1);
	}

	#[test]
	fn union_of_sources() {
		let sources = [
			source("a", &[ContentFormat::GnomeCopiedFiles]),
			source("b", &[ContentFormat::PlainText, ContentFormat::GnomeCopiedFiles]),
		];
		assert_eq!(
			available_formats(&sources),
			[ContentFormat::GnomeCopiedFiles, ContentFormat::PlainText]
		);
	}
}
