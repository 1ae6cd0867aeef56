//! 声明式渲染图
//!
//! 每个 pass 按名字声明它要访问的资源以及访问方式，渲染图据此：
//! - 推导 pass 之间的依赖，在没有依赖时保持注册顺序
//! - 沿执行顺序跟踪每个资源的状态，只在需要同步的地方插入 barrier
//! - 在末尾把资源转换到 attach 时声明的最终状态
//!
//! # 使用示例
//!
//! ```ignore
//! let mut graph = RenderGraph::new();
//! graph.attach_image("hdr", hdr_binding, RgAccess::Undefined, RgAccess::Sampled)?;
//! graph.add_pass("shading", ShadingPass { .. })?;
//! let compiled = graph.compile()?;
//! compiled.execute(&cmd);
//! ```

pub mod access;
pub mod barrier;
pub mod compiled;
pub mod error;
pub mod graph;
pub mod pass;
pub mod plan;
pub mod render_graph;
pub mod resource;
pub mod resource_state;

pub use access::{RgAccess, RgPassKind};
pub use compiled::RgCompiledGraph;
pub use error::RgError;
pub use pass::{RgPass, RgPassBuilder, RgPassContext, RgPassResources};
pub use plan::{RgExecutionPlan, RgPlanStep};
pub use render_graph::RenderGraph;
pub use resource::{RgBufferBinding, RgImageBinding};
pub use resource_state::RgResourceState;
