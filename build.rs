use std::path::{Path, PathBuf};

/// Directory holding the TensorFlow Lite Micro sources, the `tflm_*` C
/// wrapper and the converted model. Only needed with `--features tflm`.
const TFLM_ROOT: &str = "tflm";

fn main() {
    embuild::espidf::sysenv::output();

    if std::env::var("CARGO_FEATURE_TFLM").is_ok() {
        // Prefer the g++ from the Embuild toolchain; fall back to PATH.
        let compiler = find_compiler().unwrap_or_else(|| "riscv32-esp-elf-g++".into());
        build_tflm(&compiler);
    }
}

fn find_compiler() -> Option<PathBuf> {
    // Check local .embuild first, then global ~/.espressif
    let mut search_dirs = Vec::new();
    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        search_dirs.push(PathBuf::from(manifest_dir).join(".embuild"));
    }
    if let Some(home) = dirs::home_dir() {
        search_dirs.push(home.join(".espressif"));
    }

    for root in search_dirs {
        let tools_dir = root.join("espressif/tools/riscv32-esp-elf");
        let Ok(entries) = std::fs::read_dir(&tools_dir) else {
            continue;
        };
        // Versioned directory, e.g. esp-13.2.0_20240530
        for entry in entries.flatten() {
            let candidate = entry.path().join("riscv32-esp-elf/bin/riscv32-esp-elf-g++");
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}

fn build_tflm(compiler: &Path) {
    let root = PathBuf::from(TFLM_ROOT);
    if !root.is_dir() {
        panic!("feature `tflm` needs the TFLite Micro sources and model under ./{TFLM_ROOT}");
    }

    let mut build = cc::Build::new();
    build
        .cpp(true)
        .compiler(compiler)
        .flag("-std=c++17")
        .flag("-O2")
        .flag("-fno-exceptions")
        .flag("-fno-rtti")
        .define("TF_LITE_STATIC_MEMORY", None)
        .define("TF_LITE_DISABLE_X86_NEON", None)
        .include(&root)
        .include(root.join("third_party/flatbuffers/include"))
        .include(root.join("third_party/gemmlowp"))
        .include(root.join("third_party/ruy"));

    add_source_files(&mut build, &root);
    build.compile("tflm");

    println!("cargo:rerun-if-changed={TFLM_ROOT}");
}

fn add_source_files(build: &mut cc::Build, dir: &Path) {
    let entries = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", dir.display()));
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            // Reference kernels only; the tests tree has its own mains.
            if path.file_name().is_some_and(|n| n == "tests" || n == "examples") {
                continue;
            }
            add_source_files(build, &path);
        } else if path
            .extension()
            .is_some_and(|ext| ext == "c" || ext == "cc" || ext == "cpp")
        {
            build.file(&path);
        }
    }
}
