use jsonld_stream::{Options, Parser, Quad};

mod common;

struct Test {
	input: &'static str,
	expected_output: &'static str,
}

impl Test {
	pub fn run(self) {
		let _ = stderrlog::new().verbosity(2).init();

		let input = std::fs::read_to_string(self.input).unwrap();
		let mut quads = Vec::new();
		Parser::new(Options::default())
			.read(input.as_bytes(), &mut |q: Quad| quads.push(common::statement(&q)))
			.unwrap();

		let expected = std::fs::read_to_string(self.expected_output).unwrap();
		common::assert_isomorphic(&quads, &common::parse_nquads(&expected))
	}
}

macro_rules! positive_test {
	($($id:ident),*) => {
		$(
			#[test]
			fn $id () {
				Test {
					input: concat!("tests/positive/", stringify!($id) ,".jsonld"),
					expected_output: concat!("tests/positive/", stringify!($id) ,".nq"),
				}.run()
			}
		)*
	};
}

positive_test! {
	p01,
	p02,
	p03,
	p04,
	p05,
	p06,
	p07,
	p08,
	p09,
	p10,
	p11,
	p12,
	p13,
	p14,
	p15,
	p16,
	p17,
	p18,
	p19,
	p20,
	p21,
	p22,
	p23,
	p24,
	p25,
	p26,
	p27,
	p28,
	p29
}
