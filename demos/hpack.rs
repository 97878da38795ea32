use algorithm::buf::BinaryMut;
use webstream::{CompressionHint, Decoded, Decoder, Encoder, HeaderField};

fn hex_to_vec(src: &str) -> Vec<u8> {
    let compact: String = src.chars().filter(|c| !c.is_whitespace()).collect();
    (0..compact.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&compact[i..i + 2], 16).unwrap())
        .collect()
}

/// https://httpwg.org/specs/rfc7541.html#request.examples.with.huffman.coding, C.4
fn parse_header() {
    let mut decoder = Decoder::new();
    // C.4.1
    let buf = hex_to_vec("8286 8441 8cf1 e3c2 e5f2 3a6b a0ab 90f4 ff");
    let mut buf = BinaryMut::from(buf);
    loop {
        match decoder.decode(&mut buf).unwrap() {
            Decoded::Field(field) => println!("field = {:?}", field),
            Decoded::SizeUpdate(size) => println!("size update = {}", size),
            Decoded::Ongoing => break,
        }
    }
    decoder.finish_block();
    assert_eq!(decoder.index().find_field(b":authority", b"www.example.com"), 62);
}

fn encode_header() {
    let mut encoder = Encoder::new();
    let fields = vec![
        HeaderField::new(&b":method"[..], &b"GET"[..]),
        HeaderField::new(&b":path"[..], &b"/demo"[..]),
        HeaderField::with_hint(&b"authorization"[..], &b"Bearer token"[..], CompressionHint::NoCacheNoIndex),
    ];
    let mut buf = BinaryMut::new();
    let size = encoder.encode(fields.iter(), &mut buf);
    println!("encoded {} fields into {} octets", fields.len(), size);

    let mut decoder = Decoder::new();
    let decoded = decoder.decode_block(&mut buf).unwrap();
    for field in decoded {
        println!("round trip = {:?}", field);
    }
}

fn main() {
    parse_header();
    encode_header();
}
