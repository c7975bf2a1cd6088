fn main() {
    // CARGO_CFG_TARGET_OS reflects the target, not the host running the build script
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("macos") {
        // CGEventSourceCounterForEventType lives in CoreGraphics
        println!("cargo:rustc-link-lib=framework=CoreGraphics");
        println!("cargo:rustc-link-lib=framework=CoreFoundation");
    }
}
