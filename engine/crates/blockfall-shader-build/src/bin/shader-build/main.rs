//! Shader 编译工具
//!
//! 使用 glslc (来自 Vulkan SDK) 将 `shader/src` 下的 GLSL 编译为 SPIR-V，输出到 `shader/.build`

mod task;

use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};

use blockfall_crate_tools::{init_log::init_log, resource::BlockfallPath};
use rayon::prelude::*;
use task::ShaderCompileTask;

/// 返回是否编译成功
fn compile_glsl(task: &ShaderCompileTask) -> bool {
    // 确保输出目录存在
    if let Some(parent) = task.output_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("cannot create {}: {}", parent.display(), e);
            return false;
        }
    }

    let output = std::process::Command::new("glslc")
        .arg(format!("-I{}", BlockfallPath::shader_src_path().display()))
        .arg(format!("-fshader-stage={}", task.shader_stage.glslc_name()))
        .args(["-g", "--target-env=vulkan1.3", "-o"])
        .arg(&task.output_path)
        .arg(&task.shader_path)
        .output();

    match output {
        Ok(output) => {
            if !output.stdout.is_empty() {
                log::info!("stdout: {}", String::from_utf8_lossy(&output.stdout));
            }
            if !output.stderr.is_empty() {
                log::error!("stderr: {}", String::from_utf8_lossy(&output.stderr));
            }
            output.status.success()
        }
        Err(e) => {
            log::error!("failed to execute glslc: {}", e);
            false
        }
    }
}

fn main() -> ExitCode {
    init_log();

    let src_root = BlockfallPath::shader_src_path();
    let build_root = BlockfallPath::shader_build_root();
    log::info!("Shader source path: {:?}", src_root);
    log::info!("Shader output path: {:?}", build_root);

    let failed = AtomicUsize::new(0);
    walkdir::WalkDir::new(&src_root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| ShaderCompileTask::new(entry.path(), &src_root, &build_root))
        .par_bridge() // 并行化编译
        .for_each(|task| {
            if task.is_up_to_date() {
                log::debug!("up to date: {:?}", task.shader_path);
                return;
            }
            log::info!("Compiling shader: {:?}", task.shader_path);
            if !compile_glsl(&task) {
                failed.fetch_add(1, Ordering::Relaxed);
            }
        });

    let failed = failed.into_inner();
    if failed > 0 {
        log::error!("{} shader(s) failed to compile", failed);
        return ExitCode::FAILURE;
    }
    log::info!("Shader compilation completed.");
    ExitCode::SUCCESS
}
