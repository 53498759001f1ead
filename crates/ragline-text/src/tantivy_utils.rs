use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, INDEXED, STORED};
use std::str::CharIndices;
use tantivy::tokenizer::{LowerCaser, TextAnalyzer, Token, TokenStream, Tokenizer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "lower_whitespace";
pub const POSITION_FIELD: &str = "position";
pub const TEXT_FIELD: &str = "text";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _position_field = schema_builder.add_u64_field(POSITION_FIELD, STORED | INDEXED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqs);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _text_field = schema_builder.add_text_field(TEXT_FIELD, text_options);
	schema_builder.build()
}

/// Splits on any Unicode whitespace (`char::is_whitespace`), the same rule
/// as `str::split_whitespace`. tantivy's `WhitespaceTokenizer` only splits
/// on ASCII whitespace.
#[derive(Clone, Default)]
pub struct UnicodeWhitespaceTokenizer {
	token: Token,
}

pub struct UnicodeWhitespaceTokenStream<'a> {
	text: &'a str,
	chars: CharIndices<'a>,
	token: &'a mut Token,
}

impl Tokenizer for UnicodeWhitespaceTokenizer {
	type TokenStream<'a> = UnicodeWhitespaceTokenStream<'a>;

	fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
		self.token = Token::default();
		UnicodeWhitespaceTokenStream { text, chars: text.char_indices(), token: &mut self.token }
	}
}

impl UnicodeWhitespaceTokenStream<'_> {
	fn token_end(&mut self) -> usize {
		(&mut self.chars)
			.find(|(_, c)| c.is_whitespace())
			.map(|(offset, _)| offset)
			.unwrap_or(self.text.len())
	}
}

impl TokenStream for UnicodeWhitespaceTokenStream<'_> {
	fn advance(&mut self) -> bool {
		self.token.text.clear();
		self.token.position = self.token.position.wrapping_add(1);
		while let Some((offset_from, c)) = self.chars.next() {
			if !c.is_whitespace() {
				let offset_to = self.token_end();
				self.token.offset_from = offset_from;
				self.token.offset_to = offset_to;
				self.token.text.push_str(&self.text[offset_from..offset_to]);
				return true;
			}
		}
		false
	}

	fn token(&self) -> &Token { self.token }

	fn token_mut(&mut self) -> &mut Token { self.token }
}

/// Lower-case, then split on whitespace. No stemming, no stop words.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(UnicodeWhitespaceTokenizer::default())
		.filter(LowerCaser)
		.build();
	index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}

/// Query-side twin of the registered analyzer.
pub fn tokenize(text: &str) -> Vec<String> {
	text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn analyze(index: &Index, text: &str) -> Vec<String> {
		let mut analyzer = index.tokenizers().get(TOKENIZER_NAME).expect("registered");
		let mut stream = analyzer.token_stream(text);
		let mut tokens = Vec::new();
		while let Some(tok) = stream.next() {
			tokens.push(tok.text.clone());
		}
		tokens
	}

	#[test]
	fn tokenize_lowercases_and_keeps_punctuation() {
		assert_eq!(tokenize("  How do I start a FIRE?\n"), vec!["how", "do", "i", "start", "a", "fire?"]);
		assert!(tokenize(" \t ").is_empty());
	}

	#[test]
	fn analyzer_matches_query_tokenizer() {
		let index = Index::create_in_ram(build_schema());
		register_tokenizer(&index);
		for text in [
			"Boil WATER, then filter.",
			"gamma\u{a0}delta",
			"Épée\u{2003}DRILL\u{3000}fire\u{85}tinder",
			"  leading and trailing\t\n",
			"",
		] {
			assert_eq!(analyze(&index, text), tokenize(text), "text {:?}", text);
		}
		assert_eq!(analyze(&index, "gamma\u{a0}delta"), vec!["gamma", "delta"]);
	}

	#[test]
	fn token_offsets_point_into_source() {
		let mut tokenizer = UnicodeWhitespaceTokenizer::default();
		let text = "one\u{a0}twö  three";
		let mut stream = tokenizer.token_stream(text);
		let mut spans = Vec::new();
		while stream.advance() {
			let t = stream.token();
			spans.push((t.position, &text[t.offset_from..t.offset_to]));
		}
		assert_eq!(spans, vec![(0, "one"), (1, "twö"), (2, "three")]);
	}
}
