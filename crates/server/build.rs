use std::fs;
use std::path::Path;

/// Ensures `static/index.html` exists so the crate still builds and serves
/// something sane before the dashboard UI bundle (out of scope per this
/// project's spec) has been built into this directory, mirroring
/// `davidrudduck-vk-swarm`'s `server/build.rs` dummy-`frontend/dist` trick.
fn main() {
    let static_dir = Path::new("static");
    if !static_dir.join("index.html").exists() {
        println!("cargo:warning=Creating placeholder static/index.html");
        fs::create_dir_all(static_dir).unwrap();
        fs::write(
            static_dir.join("index.html"),
            "<!DOCTYPE html><html><head><title>Agent Farm</title></head>\
             <body><h1>Agent Farm dashboard</h1></body></html>",
        )
        .unwrap();
    }
}
