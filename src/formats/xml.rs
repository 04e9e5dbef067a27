//! Minimal element tree for i3D documents.
//!
//! Elements keep their attributes in insertion order. Whitespace lives in `text` (before the first child)
//! and `tail` (after the element's end tag), so indentation is just another pass over the tree.

use std::fmt::Write as _;
use std::io;

/// Attribute formatting the engine's loader expects.
pub mod fmt {
	pub fn int(value: impl Into<i64>) -> String {
		value.into().to_string()
	}

	/// Fixed point with seven decimals, `1.0` becomes `1.0000000`.
	pub fn float(value: f32) -> String {
		format!("{value:.7}")
	}

	pub fn bool(value: bool) -> String {
		let text = if value { "true" } else { "false" };
		text.to_owned()
	}

	/// Floats separated by single spaces.
	pub fn floats(values: &[f32]) -> String {
		values.iter().map(|&v| float(v)).collect::<Vec<_>>().join(" ")
	}

	/// Integers separated by single spaces.
	pub fn ints<T: Copy + Into<i64>>(values: &[T]) -> String {
		values.iter().map(|&v| int(v)).collect::<Vec<_>>().join(" ")
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
	pub tag: String,
	pub attributes: Vec<(String, String)>,
	pub children: Vec<XmlElement>,
	pub text: Option<String>,
	pub tail: Option<String>,
}

impl XmlElement {
	pub fn new(tag: impl Into<String>) -> Self {
		Self {
			tag: tag.into(),
			..Default::default()
		}
	}

	/// Sets `key`, replacing an earlier value in place.
	pub fn set_str(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
		let value = value.into();
		match self.attributes.iter_mut().find(|(k, _)| k == key) {
			Some((_, old)) => *old = value,
			None => self.attributes.push((key.to_owned(), value)),
		}
		self
	}

	pub fn set_int(&mut self, key: &str, value: impl Into<i64>) -> &mut Self {
		self.set_str(key, fmt::int(value))
	}

	pub fn set_float(&mut self, key: &str, value: f32) -> &mut Self {
		self.set_str(key, fmt::float(value))
	}

	pub fn set_bool(&mut self, key: &str, value: bool) -> &mut Self {
		self.set_str(key, fmt::bool(value))
	}

	pub fn set_floats(&mut self, key: &str, values: &[f32]) -> &mut Self {
		self.set_str(key, fmt::floats(values))
	}

	/// Builder flavour of [`XmlElement::set_str`].
	pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
		self.set_str(key, value);
		self
	}

	pub fn attr(&self, key: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, value)| value.as_str())
	}

	/// Appends `child` and returns it for further filling.
	pub fn push(&mut self, child: XmlElement) -> &mut XmlElement {
		self.children.push(child);
		let last = self.children.len() - 1;
		&mut self.children[last]
	}

	/// First child called `tag`.
	pub fn child(&self, tag: &str) -> Option<&XmlElement> {
		self.children.iter().find(|child| child.tag == tag)
	}

	/// Pre-order walk over this element and all of its descendants.
	pub fn descendants(&self) -> Vec<&XmlElement> {
		let mut out = vec![self];
		let mut i = 0;
		while i < out.len() {
			let element = out[i];
			out.splice(i + 1..i + 1, element.children.iter());
			i += 1;
		}
		out
	}

	/// Serializes the document with an ISO-8859-1 declaration.
	///
	/// Characters outside Latin-1 are written as numeric character references.
	pub fn to_latin1(&self) -> Vec<u8> {
		let mut out = String::from("<?xml version='1.0' encoding='iso-8859-1'?>\n");
		write_element(&mut out, self);
		out.chars()
			.flat_map(|c| match u8::try_from(u32::from(c)) {
				Ok(byte) => vec![byte],
				Err(_) => format!("&#{};", u32::from(c)).into_bytes(),
			})
			.collect()
	}

	pub fn write_to<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
		writer.write_all(&self.to_latin1())?;
		writer.flush()
	}
}

fn is_blank(s: &Option<String>) -> bool {
	s.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Pretty prints the tree in place with two space steps, leaving non-blank text alone.
pub fn indent(element: &mut XmlElement, level: usize) {
	let i = format!("\n{}", "  ".repeat(level));
	if !element.children.is_empty() {
		if is_blank(&element.text) {
			element.text = Some(format!("{i}  "));
		}
		if is_blank(&element.tail) {
			element.tail = Some(i.clone());
		}
		for child in &mut element.children {
			indent(child, level + 1);
		}
		if let Some(last) = element.children.last_mut() {
			if is_blank(&last.tail) {
				last.tail = Some(i);
			}
		}
	} else if level > 0 && is_blank(&element.tail) {
		element.tail = Some(i);
	}
}

fn escape_text(out: &mut String, text: &str) {
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			c => out.push(c),
		}
	}
}

fn escape_attr(out: &mut String, text: &str) {
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\n' => out.push_str("&#10;"),
			'\r' => out.push_str("&#13;"),
			'\t' => out.push_str("&#09;"),
			c => out.push(c),
		}
	}
}

fn write_element(out: &mut String, element: &XmlElement) {
	out.push('<');
	out.push_str(&element.tag);
	for (key, value) in &element.attributes {
		let _ = write!(out, " {key}=\"");
		escape_attr(out, value);
		out.push('"');
	}

	if element.children.is_empty() && element.text.as_deref().map_or(true, str::is_empty) {
		out.push_str(" />");
	} else {
		out.push('>');
		if let Some(text) = &element.text {
			escape_text(out, text);
		}
		for child in &element.children {
			write_element(out, child);
		}
		let _ = write!(out, "</{}>", element.tag);
	}

	if let Some(tail) = &element.tail {
		escape_text(out, tail);
	}
}

// reading

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XmlError {
	#[error("Unexpected end of document")]
	UnexpectedEof,
	#[error("Expected {expected} at offset {offset}")]
	Unexpected { offset: usize, expected: &'static str },
	#[error("End tag </{found}> does not close <{open}>")]
	MismatchedTag { open: String, found: String },
	#[error("Unknown entity &{0};")]
	UnknownEntity(String),
	#[error("Content after the root element at offset {0}")]
	TrailingContent(usize),
}

impl XmlElement {
	/// Reads a document as written by [`XmlElement::to_latin1`].
	pub fn parse(bytes: &[u8]) -> Result<XmlElement, XmlError> {
		let chars = bytes.iter().map(|&b| char::from(b)).collect();
		let mut parser = Parser { chars, pos: 0 };
		parser.skip_prolog()?;
		let mut root = parser.element()?;

		let tail = parser.text()?;
		if parser.pos < parser.chars.len() {
			return Err(XmlError::TrailingContent(parser.pos));
		}
		if !tail.is_empty() {
			root.tail = Some(tail);
		}
		Ok(root)
	}
}

struct Parser {
	chars: Vec<char>,
	pos: usize,
}

impl Parser {
	fn peek(&self) -> Option<char> {
		self.chars.get(self.pos).copied()
	}

	fn starts_with(&self, s: &str) -> bool {
		s.chars().enumerate().all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
	}

	fn expect(&mut self, s: &'static str) -> Result<(), XmlError> {
		if self.starts_with(s) {
			self.pos += s.chars().count();
			Ok(())
		} else if self.pos >= self.chars.len() {
			Err(XmlError::UnexpectedEof)
		} else {
			Err(XmlError::Unexpected {
				offset: self.pos,
				expected: s,
			})
		}
	}

	fn skip_whitespace(&mut self) {
		while self.peek().is_some_and(char::is_whitespace) {
			self.pos += 1;
		}
	}

	fn skip_until(&mut self, end: &'static str) -> Result<(), XmlError> {
		while !self.starts_with(end) {
			if self.pos >= self.chars.len() {
				return Err(XmlError::UnexpectedEof);
			}
			self.pos += 1;
		}
		self.expect(end)
	}

	fn skip_prolog(&mut self) -> Result<(), XmlError> {
		loop {
			self.skip_whitespace();
			if self.starts_with("<?") {
				self.skip_until("?>")?;
			} else if self.starts_with("<!--") {
				self.skip_until("-->")?;
			} else {
				return Ok(());
			}
		}
	}

	fn name(&mut self) -> Result<String, XmlError> {
		let start = self.pos;
		while self
			.peek()
			.is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
		{
			self.pos += 1;
		}
		if start == self.pos {
			return Err(XmlError::Unexpected {
				offset: self.pos,
				expected: "a name",
			});
		}
		Ok(self.chars[start..self.pos].iter().collect())
	}

	fn element(&mut self) -> Result<XmlElement, XmlError> {
		self.expect("<")?;
		let mut element = XmlElement::new(self.name()?);

		loop {
			self.skip_whitespace();
			if self.starts_with("/>") {
				self.pos += 2;
				return Ok(element);
			}
			if self.starts_with(">") {
				self.pos += 1;
				break;
			}
			let key = self.name()?;
			self.skip_whitespace();
			self.expect("=")?;
			self.skip_whitespace();
			self.expect("\"")?;
			let value = self.until('"')?;
			self.pos += 1;
			element.attributes.push((key, value));
		}

		let text = self.text()?;
		if !text.is_empty() {
			element.text = Some(text);
		}
		loop {
			if self.starts_with("</") {
				self.pos += 2;
				let found = self.name()?;
				if found != element.tag {
					return Err(XmlError::MismatchedTag {
						open: element.tag,
						found,
					});
				}
				self.skip_whitespace();
				self.expect(">")?;
				return Ok(element);
			}
			if self.starts_with("<!--") {
				self.skip_until("-->")?;
				continue;
			}
			if self.pos >= self.chars.len() {
				return Err(XmlError::UnexpectedEof);
			}
			let mut child = self.element()?;
			let tail = self.text()?;
			if !tail.is_empty() {
				child.tail = Some(tail);
			}
			element.children.push(child);
		}
	}

	/// Character data up to the next `<` or the end of input, unescaped.
	fn text(&mut self) -> Result<String, XmlError> {
		let mut out = String::new();
		while let Some(c) = self.peek() {
			match c {
				'<' => break,
				'&' => out.push(self.entity()?),
				c => {
					out.push(c);
					self.pos += 1;
				}
			}
		}
		Ok(out)
	}

	/// Attribute value up to `quote`, unescaped.
	fn until(&mut self, quote: char) -> Result<String, XmlError> {
		let mut out = String::new();
		loop {
			match self.peek() {
				None => return Err(XmlError::UnexpectedEof),
				Some(c) if c == quote => return Ok(out),
				Some('&') => out.push(self.entity()?),
				Some(c) => {
					out.push(c);
					self.pos += 1;
				}
			}
		}
	}

	fn entity(&mut self) -> Result<char, XmlError> {
		self.expect("&")?;
		let start = self.pos;
		while self.peek().is_some_and(|c| c != ';') {
			self.pos += 1;
		}
		let name = self.chars[start..self.pos].iter().collect::<String>();
		self.expect(";")?;

		let code = match name.as_str() {
			"amp" => return Ok('&'),
			"lt" => return Ok('<'),
			"gt" => return Ok('>'),
			"quot" => return Ok('"'),
			"apos" => return Ok('\''),
			_ => match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
				Some(hex) => u32::from_str_radix(hex, 16).ok(),
				None => name.strip_prefix('#').and_then(|dec| dec.parse().ok()),
			},
		};
		code.and_then(char::from_u32).ok_or(XmlError::UnknownEntity(name))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn document() -> XmlElement {
		let mut root = XmlElement::new("i3D");
		root.set_str("name", "test");
		let scene = root.push(XmlElement::new("Scene"));
		scene
			.push(XmlElement::new("TransformGroup"))
			.set_str("name", "a")
			.set_int("nodeId", 1u32);
		root.push(XmlElement::new("Animation"));
		root
	}

	#[test]
	fn attribute_formatting() {
		assert_eq!(fmt::int(5), "5");
		assert_eq!(fmt::float(1.0), "1.0000000");
		assert_eq!(fmt::float(-0.25), "-0.2500000");
		assert_eq!(fmt::bool(true), "true");
		assert_eq!(fmt::bool(false), "false");
		assert_eq!(fmt::floats(&[1.0, 0.5]), "1.0000000 0.5000000");
		assert_eq!(fmt::ints(&[3u32, 4, 5]), "3 4 5");
	}

	#[test]
	fn set_replaces_in_place() {
		let mut element = XmlElement::new("Shape");
		element.set_str("a", "1").set_str("b", "2").set_bool("a", true);
		assert_eq!(
			element.attributes,
			[("a".to_owned(), "true".to_owned()), ("b".to_owned(), "2".to_owned())]
		);
	}

	#[test]
	fn indentation_matches_element_tree_recipe() {
		let mut root = document();
		indent(&mut root, 0);
		let written = String::from_utf8(root.to_latin1()).unwrap();
		assert_eq!(
			written,
			"<?xml version='1.0' encoding='iso-8859-1'?>\n\
			 <i3D name=\"test\">\n  \
			 <Scene>\n    \
			 <TransformGroup name=\"a\" nodeId=\"1\" />\n  \
			 </Scene>\n  \
			 <Animation />\n\
			 </i3D>\n"
		);
	}

	#[test]
	fn indentation_keeps_real_text() {
		let mut root = XmlElement::new("a");
		root.text = Some("keep".to_owned());
		root.push(XmlElement::new("b"));
		indent(&mut root, 0);
		assert_eq!(root.text.as_deref(), Some("keep"));
		assert_eq!(root.children[0].tail.as_deref(), Some("\n"));
	}

	#[test]
	fn escapes_and_encodes_latin1() {
		let mut root = XmlElement::new("File");
		root.set_str("filename", "a&b \"c\" <d> é ✓");
		let bytes = root.to_latin1();
		let body = &bytes[44..];
		assert_eq!(
			body,
			b"<File filename=\"a&amp;b &quot;c&quot; &lt;d&gt; \xe9 &#10003;\" />".as_slice()
		);
	}

	#[test]
	fn parse_reads_back_written_document() {
		let mut root = document();
		root.children[1].set_str("note", "x < y & \"z\" é ✓");
		indent(&mut root, 0);
		let parsed = XmlElement::parse(&root.to_latin1()).unwrap();
		assert_eq!(parsed, root);
	}

	#[test]
	fn parse_rejects_mismatched_tags() {
		let err = XmlElement::parse(b"<a><b></a></b>").unwrap_err();
		assert_eq!(
			err,
			XmlError::MismatchedTag {
				open: "b".to_owned(),
				found: "a".to_owned()
			}
		);
		assert_eq!(XmlElement::parse(b"<a>").unwrap_err(), XmlError::UnexpectedEof);
	}

	#[test]
	fn descendants_are_pre_order() {
		let root = document();
		let tags = root.descendants().iter().map(|e| e.tag.as_str()).collect::<Vec<_>>();
		assert_eq!(tags, ["i3D", "Scene", "TransformGroup", "Animation"]);
	}
}
