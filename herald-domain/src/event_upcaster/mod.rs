//! 事件上抬（Event Upcasting）
//!
//! 当事件载荷结构演进时，通过升级器（`EventUpcaster`）把旧版本事件转换为
//! 消费方期望的版本。每个升级器是某事件类型版本图上的一条有向边，
//! `EventUpcasterChain` 以广度优先搜索找出跳数最少的路径并依次应用。
//!
//! 调用方可区分两类失败：`UpcastPathNotFound`（无路径，可跳过该事件）与
//! `VersionMismatch`/`TypeMismatch`（升级器注册有误，应当中止）。
//!
mod chain;
mod upcaster;
mod version;

pub use chain::{EventUpcasterChain, UpcastResult, UpcastStep};
pub use upcaster::{EventUpcaster, FnUpcaster};
pub use version::compare_versions;
