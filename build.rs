fn main() {
    println!("cargo:rerun-if-env-changed=CMAKE_WRAPPER_DEFAULT_TOOL");

    let tool = std::env::var("CMAKE_WRAPPER_DEFAULT_TOOL")
        .ok()
        .filter(|x| !x.trim().is_empty())
        .unwrap_or_else(|| "cmake".into());

    println!("cargo:rustc-env=CMAKE_WRAPPER_DEFAULT_TOOL={tool}");
}
