//! Pass 定义和构建器
//!
//! 提供 `RgPass` trait 用于声明式定义渲染 Pass，
//! 以及 `RgPassBuilder` 用于在 setup 阶段按名字声明资源访问。

use blockfall_gfx::commands::command_buffer::GfxCommandBuffer;

use crate::{
    access::{RgAccess, RgPassKind},
    resource::{RgBufferBinding, RgImageBinding, RgPhysical, RgResourceRegistry},
};

/// pass 对一个资源的一次声明
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgAccessDecl {
    pub resource: String,
    pub access: RgAccess,
}

/// Pass 构建器
///
/// 在 `RgPass::setup()` 中使用，声明 Pass 的资源访问以及可选的顺序提示。
/// 声明但没有实际使用的资源是允许的。
pub struct RgPassBuilder {
    pub(crate) decls: Vec<RgAccessDecl>,
    pub(crate) run_after: Vec<String>,
}
impl RgPassBuilder {
    pub(crate) fn new() -> Self {
        Self {
            decls: Vec::new(),
            run_after: Vec::new(),
        }
    }

    pub fn access(&mut self, resource: impl Into<String>, access: RgAccess) -> &mut Self {
        self.decls.push(RgAccessDecl {
            resource: resource.into(),
            access,
        });
        self
    }

    #[inline]
    pub fn read(&mut self, resource: impl Into<String>) -> &mut Self {
        self.access(resource, RgAccess::Read)
    }

    #[inline]
    pub fn write(&mut self, resource: impl Into<String>) -> &mut Self {
        self.access(resource, RgAccess::Write)
    }

    #[inline]
    pub fn read_write(&mut self, resource: impl Into<String>) -> &mut Self {
        self.access(resource, RgAccess::ReadWrite)
    }

    #[inline]
    pub fn sampled(&mut self, resource: impl Into<String>) -> &mut Self {
        self.access(resource, RgAccess::Sampled)
    }

    #[inline]
    pub fn indirect_argument(&mut self, resource: impl Into<String>) -> &mut Self {
        self.access(resource, RgAccess::IndirectArgument)
    }

    #[inline]
    pub fn transfer_src(&mut self, resource: impl Into<String>) -> &mut Self {
        self.access(resource, RgAccess::TransferSrc)
    }

    #[inline]
    pub fn transfer_dst(&mut self, resource: impl Into<String>) -> &mut Self {
        self.access(resource, RgAccess::TransferDst)
    }

    /// 要求在 `pass` 之后执行，即使两者之间没有数据依赖
    pub fn run_after(&mut self, pass: impl Into<String>) -> &mut Self {
        self.run_after.push(pass.into());
        self
    }
}

/// pass 执行时可以看到的资源：只有自己声明过的
pub struct RgPassResources<'a> {
    pub(crate) pass_name: &'a str,
    pub(crate) decls: &'a [RgAccessDecl],
    pub(crate) registry: &'a RgResourceRegistry,
}
impl<'a> RgPassResources<'a> {
    #[inline]
    fn is_declared(&self, name: &str) -> bool {
        self.decls.iter().any(|decl| decl.resource == name)
    }

    /// 未声明的资源在 debug 下直接断言失败；release 下找不到时返回空绑定
    pub fn image(&self, name: &str) -> RgImageBinding {
        debug_assert!(self.is_declared(name), "pass `{}` touches undeclared resource `{}`", self.pass_name, name);
        match self.registry.get_by_name(name).map(|res| res.physical) {
            Some(RgPhysical::Image(image)) => image,
            _ => {
                log::error!("pass `{}`: `{}` is not an attached image", self.pass_name, name);
                RgImageBinding::NULL
            }
        }
    }

    pub fn buffer(&self, name: &str) -> RgBufferBinding {
        debug_assert!(self.is_declared(name), "pass `{}` touches undeclared resource `{}`", self.pass_name, name);
        match self.registry.get_by_name(name).map(|res| res.physical) {
            Some(RgPhysical::Buffer(buffer)) => buffer,
            _ => {
                log::error!("pass `{}`: `{}` is not an attached buffer", self.pass_name, name);
                RgBufferBinding::NULL
            }
        }
    }

    /// 本 pass 对该资源声明的访问方式
    pub fn declared_access(&self, name: &str) -> Option<RgAccess> {
        self.decls.iter().find(|decl| decl.resource == name).map(|decl| decl.access)
    }
}

/// Pass 执行时的上下文
pub struct RgPassContext<'a> {
    /// 命令缓冲区，已经处于录制状态
    pub cmd: &'a GfxCommandBuffer,
    pub resources: RgPassResources<'a>,
}
impl RgPassContext<'_> {
    #[inline]
    pub fn image(&self, name: &str) -> RgImageBinding {
        self.resources.image(name)
    }

    #[inline]
    pub fn buffer(&self, name: &str) -> RgBufferBinding {
        self.resources.buffer(name)
    }

    #[inline]
    pub fn pass_name(&self) -> &str {
        self.resources.pass_name
    }
}

/// RgPass trait
///
/// 定义渲染图中的一个 Pass。
///
/// # 示例
///
/// ```ignore
/// struct BlurPass<'a> {
///     pipeline: &'a GfxComputePipeline,
/// }
///
/// impl RgPass for BlurPass<'_> {
///     fn kind(&self) -> RgPassKind {
///         RgPassKind::Compute
///     }
///
///     fn setup(&mut self, builder: &mut RgPassBuilder) {
///         builder.sampled("input").write("output");
///     }
///
///     fn execute(&self, ctx: &RgPassContext<'_>) {
///         let output = ctx.image("output");
///         // 绑定 pipeline, dispatch...
///     }
/// }
/// ```
///
/// Pass 不需要是 Send + Sync，渲染图只在构建帧的线程中使用。
/// Pass 可以借用外部资源，生命周期由 RenderGraph 的生命周期参数约束。
pub trait RgPass {
    fn kind(&self) -> RgPassKind;

    /// 声明 Pass 的资源访问
    fn setup(&mut self, builder: &mut RgPassBuilder);

    /// 录制命令，不能等待其他 pass
    fn execute(&self, ctx: &RgPassContext<'_>);
}

/// 用闭包实现的 pass，适合简单的 transfer 步骤
pub(crate) struct RgFnPass<F> {
    pub kind: RgPassKind,
    pub exec: F,
}
impl<F: Fn(&RgPassContext<'_>)> RgPass for RgFnPass<F> {
    fn kind(&self) -> RgPassKind {
        self.kind
    }

    fn setup(&mut self, _builder: &mut RgPassBuilder) {}

    fn execute(&self, ctx: &RgPassContext<'_>) {
        (self.exec)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;

    fn registry() -> RgResourceRegistry {
        let mut registry = RgResourceRegistry::new();
        let image = RgImageBinding::new(
            vk::Image::null(),
            vk::ImageView::null(),
            vk::Format::R8G8B8A8_UNORM,
            vk::Extent2D { width: 4, height: 4 },
            vk::ImageAspectFlags::COLOR,
        );
        registry.attach("color", RgPhysical::Image(image), RgAccess::Undefined, RgAccess::Sampled).unwrap();
        registry
            .attach(
                "args",
                RgPhysical::Buffer(RgBufferBinding::new(vk::Buffer::null(), 64)),
                RgAccess::Undefined,
                RgAccess::IndirectArgument,
            )
            .unwrap();
        registry
    }

    #[test]
    fn declared_resources_resolve() {
        let registry = registry();
        let decls = vec![RgAccessDecl {
            resource: "args".to_string(),
            access: RgAccess::Write,
        }];
        let resources = RgPassResources {
            pass_name: "cull",
            decls: &decls,
            registry: &registry,
        };
        assert_eq!(resources.buffer("args").size, 64);
        assert_eq!(resources.declared_access("args"), Some(RgAccess::Write));
        assert_eq!(resources.declared_access("color"), None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "undeclared resource `color`")]
    fn undeclared_access_asserts_in_debug() {
        let registry = registry();
        let resources = RgPassResources {
            pass_name: "cull",
            decls: &[],
            registry: &registry,
        };
        resources.image("color");
    }

    #[test]
    fn builder_chains_declarations() {
        let mut builder = RgPassBuilder::new();
        builder.sampled("a").write("b").run_after("reset");
        assert_eq!(builder.decls.len(), 2);
        assert_eq!(builder.decls[1].access, RgAccess::Write);
        assert_eq!(builder.run_after, vec!["reset".to_string()]);
    }
}
