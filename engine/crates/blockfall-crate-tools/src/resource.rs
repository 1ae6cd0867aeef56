use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let config = BlockfallPath::workspace_path().join("blockfall.toml");
/// let spv = BlockfallPath::shader_build_path("cull/cull_objects.comp"); // shader/.build/cull/cull_objects.comp.spv
/// ```
pub struct BlockfallPath;
impl BlockfallPath {
    /// 获取工作区根目录
    ///
    /// 当前 crate 位于 `engine/crates/blockfall-crate-tools`
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.ancestors().nth(3).unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn shader_root_path() -> PathBuf {
        Self::workspace_path().join("shader")
    }

    /// shader 源码目录
    pub fn shader_src_path() -> PathBuf {
        Self::shader_root_path().join("src")
    }

    /// 编译后的 SPIR-V 目录
    pub fn shader_build_root() -> PathBuf {
        Self::shader_root_path().join(".build")
    }

    /// 获取 `shader/.build/` 目录下的着色器路径（编译后的 SPIR-V）
    pub fn shader_build_path(filename: &str) -> PathBuf {
        Self::spv_path(&Self::shader_build_root(), filename)
    }

    /// 在任意的 shader 输出目录下拼出 `<name>.spv`
    pub fn spv_path(shader_dir: &Path, filename: &str) -> PathBuf {
        let mut path = shader_dir.join(filename).into_os_string();
        path.push(".spv");
        PathBuf::from(path)
    }

    /// 默认的渲染配置文件
    pub fn default_settings_path() -> PathBuf {
        Self::workspace_path().join("blockfall.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spv_path_appends_extension() {
        let path = BlockfallPath::spv_path(Path::new("/tmp/shaders"), "post/bloom.comp");
        assert_eq!(path, PathBuf::from("/tmp/shaders/post/bloom.comp.spv"));
    }

    #[test]
    fn shader_paths_live_under_workspace() {
        let root = BlockfallPath::workspace_path();
        assert!(BlockfallPath::shader_build_root().starts_with(&root));
        assert!(BlockfallPath::shader_src_path().ends_with("shader/src"));
    }
}
