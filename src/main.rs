use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, ValueEnum};
use clipowner::{
	available_formats, copy, query_targets, Config, ContentFormat, ContentSource, Error,
	LinuxClipboardKind, SessionEnd, TimestampPolicy,
};

/// Copies files or text to the clipboard, offering them in several formats
/// so that file managers, browsers and editors can each paste what they
/// understand.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
	/// Write to clipboard target PLAINTEXT
	#[arg(long = "PLAINTEXT")]
	plaintext: bool,

	/// Write to clipboard target FORMATTED_TEXT
	#[arg(long = "FORMATTED_TEXT")]
	formatted_text: bool,

	/// Write to clipboard target TIMESTAMP
	#[arg(long = "TIMESTAMP")]
	timestamp: bool,

	/// Write to clipboard target URI_LIST
	#[arg(long = "URI_LIST")]
	uri_list: bool,

	/// Write to clipboard target GNOME_COPIED_FILES
	#[arg(long = "GNOME_COPIED_FILES")]
	gnome_copied_files: bool,

	/// File to put on the clipboard; may be given more than once
	#[arg(long = "FILE", value_name = "PATH", required_unless_present_any = ["text", "query"])]
	files: Vec<PathBuf>,

	/// Text to put on the clipboard
	#[arg(long)]
	text: Option<String>,

	/// HTML to offer alongside --text
	#[arg(long, requires = "text")]
	html: Option<String>,

	/// Selection to own
	#[arg(long, value_enum, default_value_t = Selection::Clipboard)]
	selection: Selection,

	/// X11 display to connect to instead of $DISPLAY
	#[arg(long)]
	display: Option<String>,

	/// How to derive the TIMESTAMP of files
	#[arg(long, value_enum, default_value_t = TimestampSource::Fixed)]
	timestamp_policy: TimestampSource,

	/// Print the targets offered by the current owner and exit
	#[arg(long, conflicts_with_all = ["files", "text"])]
	query: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Selection {
	Clipboard,
	Primary,
	Secondary,
}

impl From<Selection> for LinuxClipboardKind {
	fn from(selection: Selection) -> Self {
		match selection {
			Selection::Clipboard => LinuxClipboardKind::Clipboard,
			Selection::Primary => LinuxClipboardKind::Primary,
			Selection::Secondary => LinuxClipboardKind::Secondary,
		}
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimestampSource {
	/// The same value every time
	Fixed,
	/// The latest modification time of the files
	Modified,
}

impl Args {
	fn requested_formats(&self) -> Vec<ContentFormat> {
		[
			(self.plaintext, ContentFormat::PlainText),
			(self.formatted_text, ContentFormat::FormattedText),
			(self.timestamp, ContentFormat::Timestamp),
			(self.uri_list, ContentFormat::UriList),
			(self.gnome_copied_files, ContentFormat::GnomeCopiedFiles),
		]
		.into_iter()
		.filter_map(|(selected, format)| selected.then_some(format))
		.collect()
	}

	fn sources(&self) -> Result<Vec<ContentSource>, Error> {
		let mut sources = Vec::new();
		if let Some(text) = &self.text {
			let mut source = ContentSource::text(text.as_str());
			if let Some(html) = &self.html {
				source = source.with_html(html.as_str());
			}
			sources.push(source);
		}
		if !self.files.is_empty() {
			let policy = match self.timestamp_policy {
				TimestampSource::Fixed => TimestampPolicy::default(),
				TimestampSource::Modified => TimestampPolicy::LastModified,
			};
			sources.push(ContentSource::files(self.files.as_slice(), &policy)?);
		}
		Ok(sources)
	}

	fn config(&self) -> Config {
		Config {
			selection: self.selection.into(),
			display: self.display.clone(),
			..Config::default()
		}
	}
}

fn run(args: &Args) -> Result<(), Error> {
	let config = args.config();
	if args.query {
		for target in query_targets(&config)? {
			println!("{target}");
		}
		return Ok(());
	}

	let requested = args.requested_formats();
	log::info!("the following formats were requested: {:?}", requested);
	let sources = args.sources()?;
	for source in &sources {
		log::debug!("{} can provide {:?}", source.label(), source.formats().collect::<Vec<_>>());
		if log::log_enabled!(log::Level::Trace) {
			show(source);
		}
	}
	log::debug!("available formats: {:?}", available_formats(&sources));

	match copy(&config, &requested, sources)? {
		SessionEnd::Lost => log::debug!("another client owns the selection now"),
		SessionEnd::Released => log::debug!("the selection was released"),
	}
	Ok(())
}

/// Logs what `source` renders for every format it offers.
///
/// Runs every producer, so it is only called when tracing is enabled.
fn show(source: &ContentSource) {
	for format in source.formats() {
		match source.value(format) {
			Ok(bytes) => {
				log::trace!("{} {}: {:?}", source.label(), format, String::from_utf8_lossy(&bytes))
			}
			Err(e) => log::trace!("{} {}: {}", source.label(), format, e),
		}
	}
}

fn main() -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let args = Args::parse();
	match run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			log::error!("{e}");
			ExitCode::FAILURE
		}
	}
}
