use std::env;

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=cbindgen.toml");
    println!("cargo:rerun-if-changed=../scriptcore/src/native");
    let crate_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
    match cbindgen::generate(crate_dir) {
        Ok(bindings) => {
            bindings.write_to_file("include/scriptcore_quickjs.h");
        }
        Err(err) => println!("cargo:warning=failed to generate C header: {err}"),
    }
}
