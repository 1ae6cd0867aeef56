//! 编译任务

use std::path::{Path, PathBuf};

use blockfall_crate_tools::resource::BlockfallPath;

/// 渲染器只用到这三种 stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}
impl ShaderStage {
    /// 根据文件扩展名判断，不支持的文件返回 None
    pub fn from_file_name(shader_name: &str) -> Option<Self> {
        let (_, ext) = shader_name.rsplit_once('.')?;
        match ext {
            "vert" => Some(Self::Vertex),
            "frag" => Some(Self::Fragment),
            "comp" => Some(Self::Compute),
            _ => None,
        }
    }

    /// glslc 的 `-fshader-stage`
    pub fn glslc_name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        }
    }
}

/// 一个具体的编译任务
#[derive(Debug)]
pub struct ShaderCompileTask {
    pub shader_path: PathBuf,
    pub output_path: PathBuf,
    pub shader_stage: ShaderStage,
}
impl ShaderCompileTask {
    /// # Arguments
    /// * `src_root` - shader 源码根目录
    /// * `build_root` - 输出根目录，保持相对路径不变，文件名追加 `.spv`
    pub fn new(shader_path: &Path, src_root: &Path, build_root: &Path) -> Option<Self> {
        let relative_path = shader_path.strip_prefix(src_root).ok()?;
        let shader_stage = ShaderStage::from_file_name(shader_path.file_name()?.to_str()?)?;
        let output_path = BlockfallPath::spv_path(build_root, relative_path.to_str()?);

        Some(Self {
            shader_path: shader_path.to_path_buf(),
            output_path,
            shader_stage,
        })
    }

    /// 输出比源码新时跳过
    pub fn is_up_to_date(&self) -> bool {
        let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
        match (modified(&self.shader_path), modified(&self.output_path)) {
            (Some(src), Some(out)) => out >= src,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_mirrors_source_layout() {
        let task = ShaderCompileTask::new(
            Path::new("/ws/shader/src/cull/cull_objects.comp"),
            Path::new("/ws/shader/src"),
            Path::new("/ws/shader/.build"),
        )
        .unwrap();
        assert_eq!(task.shader_stage, ShaderStage::Compute);
        assert_eq!(task.output_path, PathBuf::from("/ws/shader/.build/cull/cull_objects.comp.spv"));
    }

    #[test]
    fn headers_and_foreign_files_are_ignored() {
        let src = Path::new("/ws/shader/src");
        let build = Path::new("/ws/shader/.build");
        assert!(ShaderCompileTask::new(Path::new("/ws/shader/src/common/frame.glsl"), src, build).is_none());
        assert!(ShaderCompileTask::new(Path::new("/ws/shader/src/README.md"), src, build).is_none());
        assert!(ShaderCompileTask::new(Path::new("/elsewhere/a.comp"), src, build).is_none());
    }
}
