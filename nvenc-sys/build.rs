use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=NVENC_SDK_INCLUDE");

    // The bindings are only usable on Windows where `nvEncodeAPI64.dll` is loaded at runtime.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    let header = match env::var_os("NVENC_SDK_INCLUDE") {
        Some(dir) => PathBuf::from(dir).join("nvEncodeAPI.h"),
        None => PathBuf::from("nvEncodeAPI.h"),
    };
    println!("cargo:rerun-if-changed={}", header.display());

    let bindings = bindgen::Builder::default()
        .header(header.to_string_lossy())
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .layout_tests(false)
        .default_enum_style(bindgen::EnumVariation::Rust {
            non_exhaustive: true,
        })
        .rustified_enum("_NVENCSTATUS")
        .derive_default(true)
        .generate()
        .expect("Unable to generate bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");
}
