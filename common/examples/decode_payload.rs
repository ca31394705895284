use std::env::args;

use ctpeek_common::gob::Decoder;
use ctpeek_common::template::{render, TemplateData};
use ctpeek_common::lzw;

// Decodes a raw dedup payload file (as stored in the KV value, after
// base64) and prints the rendered service list.
fn main() {
    let input = args().nth(1).unwrap();

    let payload = std::fs::read(input).unwrap();
    let decompressed = lzw::decompress(&payload).unwrap();
    println!("Decompressed: {} bytes", decompressed.len());

    let graph = Decoder::new(&decompressed).decode().unwrap();
    let data = TemplateData::from_value(&graph).unwrap();
    print!("{}", render(&data));
}
