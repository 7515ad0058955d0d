use jsonld_stream::{parse_str, ErrorCode, Options};

struct Test {
	input: &'static str,
	expected_error: ErrorCode,
}

impl Test {
	pub fn run(self) {
		let _ = stderrlog::new().verbosity(2).init();

		let input = std::fs::read_to_string(self.input).unwrap();
		match parse_str(&input, Options::default()) {
			Ok(quads) => panic!("expected `{}`, got {} quads", self.expected_error, quads.len()),
			Err(e) => assert_eq!(e.code(), Some(self.expected_error), "{e}"),
		}
	}
}

macro_rules! negative_test {
	($($id:ident => $code:ident),*) => {
		$(
			#[test]
			fn $id () {
				Test {
					input: concat!("tests/negative/", stringify!($id) ,".jsonld"),
					expected_error: ErrorCode::$code,
				}.run()
			}
		)*
	};
}

negative_test! {
	n01 => InvalidStreamingKeyOrder,
	n02 => InvalidValueObject,
	n03 => CollidingKeywords,
	n04 => InvalidTypeValue,
	n05 => InvalidValueObjectValue,
	n06 => InvalidReverseValue,
	n07 => InvalidLanguageMapValue,
	n08 => InvalidId,
	n09 => InvalidValueObject,
	n10 => InvalidSetOrListObject,
	n11 => InvalidIncludedValue,
	n12 => InvalidLanguageTaggedValue,
	n13 => InvalidTypeValue,
	n14 => InvalidIncludedValue,
	n15 => InvalidSetOrListObject
}
