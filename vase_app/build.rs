// Compiles the GLSL shaders under resources/shaders to SPIR-V in $OUT_DIR/shaders

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 6] = ["vert", "frag", "comp", "geom", "tesc", "tese"];

fn is_stale(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(dst)) => src > dst,
        _ => true,
    }
}

fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &Path) -> usize {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return 0;
        }
    };

    let mut compiled = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        if !SHADER_EXTENSIONS.contains(&ext) {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        // simple_shader.vert -> simple_shader.vert.spv
        let mut out_name = file_name.to_os_string();
        out_name.push(".spv");
        let out_file = target_dir.join(out_name);

        if !is_stale(&path, &out_file) {
            eprintln!("info: Shader {:?} is up to date", file_name);
            continue;
        }

        let status = Command::new(glslc)
            .arg("-I")
            .arg(shader_dir)
            .arg(&path)
            .arg("-o")
            .arg(&out_file)
            .status();

        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {:?} -> {:?}", file_name, out_file);
                compiled += 1;
            }
            Ok(s) => panic!("glslc failed for {:?} with exit code {}", path, s.code().unwrap_or(-1)),
            Err(e) => panic!("Failed to run glslc for {:?}: {}", path, e),
        }
    }
    compiled
}

fn main() {
    println!("cargo:rerun-if-changed=resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("set by cargo"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("set by cargo"));
    let target_dir = out_dir.join("shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        panic!("Failed to create {:?}: {}", target_dir, e);
    }

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => PathBuf::from(sdk),
        Err(_) => {
            println!("cargo:warning=VULKAN_SDK not set, shaders were not compiled");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        vulkan_sdk.join("Bin").join("glslc.exe")
    } else {
        vulkan_sdk.join("bin").join("glslc")
    };
    if !glslc.exists() {
        panic!("glslc not found at {:?}; check the Vulkan SDK installation", glslc);
    }

    let compiled = compile_shaders(&manifest_dir.join("resources/shaders"), &target_dir, &glslc);
    if compiled > 0 {
        eprintln!("info: Compiled {} shader(s)", compiled);
    } else {
        eprintln!("info: All shaders are up to date");
    }
}
