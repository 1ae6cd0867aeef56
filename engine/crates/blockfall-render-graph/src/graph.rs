//! 依赖图构建和拓扑排序
//!
//! 分析 Pass 之间的资源依赖关系，构建 DAG 并在保持注册顺序的前提下排序。

use std::{cmp::Reverse, collections::BinaryHeap};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::access::RgAccess;

/// 依赖图
///
/// 边总是从先执行的 pass 指向后执行的 pass
pub struct RgDependencyGraph {
    pass_count: usize,
    /// 邻接表（出边）
    adjacency: Vec<Vec<usize>>,
    in_degrees: Vec<usize>,
}
// new & init
impl RgDependencyGraph {
    pub fn new(pass_count: usize) -> Self {
        Self {
            pass_count,
            adjacency: vec![Vec::new(); pass_count],
            in_degrees: vec![0; pass_count],
        }
    }

    /// 分析资源依赖，构建依赖图
    ///
    /// `decls[pass]` 是该 pass 声明的 (资源索引, 访问方式)，按注册顺序遍历：
    /// - 写后读：reader 依赖之前的 writer
    /// - 读后写：writer 依赖上一次写入之后的所有 reader
    /// - 写后写：后一个 writer 依赖前一个 writer
    pub fn analyze(resource_count: usize, decls: &[Vec<(usize, RgAccess)>]) -> Self {
        let mut graph = Self::new(decls.len());

        let mut last_writer: Vec<Option<usize>> = vec![None; resource_count];
        let mut readers_since_write: Vec<Vec<usize>> = vec![Vec::new(); resource_count];

        for (pass_idx, pass_decls) in decls.iter().enumerate() {
            for &(res, access) in pass_decls {
                if let Some(writer) = last_writer[res] {
                    graph.add_edge(writer, pass_idx);
                }
                if access.is_write() {
                    for &reader in &readers_since_write[res] {
                        graph.add_edge(reader, pass_idx);
                    }
                    readers_since_write[res].clear();
                    last_writer[res] = Some(pass_idx);
                } else {
                    readers_since_write[res].push(pass_idx);
                }
            }
        }

        graph
    }
}
// update
impl RgDependencyGraph {
    /// 添加依赖边，`producer` 先于 `consumer` 执行
    ///
    /// 自环只可能来自顺序提示，保留下来由排序报告为环
    pub fn add_edge(&mut self, producer: usize, consumer: usize) {
        if !self.adjacency[producer].contains(&consumer) {
            self.adjacency[producer].push(consumer);
            self.in_degrees[consumer] += 1;
        }
    }
}
// getters
impl RgDependencyGraph {
    #[inline]
    pub fn successors(&self, pass_index: usize) -> &[usize] {
        &self.adjacency[pass_index]
    }

    pub fn predecessors(&self, pass_index: usize) -> Vec<usize> {
        (0..self.pass_count).filter(|&i| self.adjacency[i].contains(&pass_index)).collect()
    }

    #[inline]
    pub fn has_edge(&self, producer: usize, consumer: usize) -> bool {
        self.adjacency[producer].contains(&consumer)
    }
}
// tools
impl RgDependencyGraph {
    /// Kahn 拓扑排序，就绪的 pass 中总是先取注册序号最小的
    ///
    /// # 返回
    /// - `Ok(order)`: 排序后的 pass 索引
    /// - `Err(cycles)`: 每个环（强连通分量）中的 pass 索引
    pub fn topological_sort(&self) -> Result<Vec<usize>, Vec<Vec<usize>>> {
        let mut in_degrees = self.in_degrees.clone();
        let mut ready: BinaryHeap<Reverse<usize>> =
            (0..self.pass_count).filter(|&i| in_degrees[i] == 0).map(Reverse).collect();
        let mut result = Vec::with_capacity(self.pass_count);

        while let Some(Reverse(node)) = ready.pop() {
            result.push(node);
            for &next in &self.adjacency[node] {
                in_degrees[next] -= 1;
                if in_degrees[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if result.len() == self.pass_count { Ok(result) } else { Err(self.cycles()) }
    }

    /// 通过强连通分量找出所有的环
    fn cycles(&self) -> Vec<Vec<usize>> {
        let mut graph = DiGraph::<usize, ()>::with_capacity(self.pass_count, 0);
        let nodes: Vec<NodeIndex> = (0..self.pass_count).map(|i| graph.add_node(i)).collect();
        for (from, targets) in self.adjacency.iter().enumerate() {
            for &to in targets {
                graph.add_edge(nodes[from], nodes[to], ());
            }
        }

        let mut cycles: Vec<Vec<usize>> = petgraph::algo::tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut passes: Vec<usize> = scc.into_iter().map(|n| graph[n]).collect();
                passes.sort_unstable();
                passes
            })
            .collect();
        cycles.sort();
        cycles
    }
}
