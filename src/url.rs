use std::path::Path;

// on x11, path will be encode as
// "/home/rustdesk/pictures/🖼️.png" -> "file:///home/rustdesk/pictures/%F0%9F%96%BC%EF%B8%8F.png"
// file managers decode it again, so only controls and spaces are escaped
const ENCODE_SET: percent_encoding::AsciiSet = percent_encoding::CONTROLS.add(b' ');

pub(crate) fn encode_path_to_uri(path: &Path) -> String {
	let encoded = percent_encoding::percent_encode(path.as_os_str().as_encoded_bytes(), &ENCODE_SET);
	format!("file://{}", encoded)
}

// helper encode function
// convert a list of paths to 'text/uri-list' data
// # Note
// - entries are separated by '\n' without a trailing newline
pub(crate) fn encode_uri_list<P: AsRef<Path>>(paths: &[P]) -> String {
	paths.iter().map(|path| encode_path_to_uri(path.as_ref())).collect::<Vec<_>>().join("\n")
}
