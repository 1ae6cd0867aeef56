use std::{fmt::Display, ops::Deref};

pub struct FrameCounter {
    /// 当前的帧序号，一直累加，从 1 开始
    frame_id: u64,
    /// 0 表示不限帧
    frame_limit: f32,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64, frame_limit: f32) -> Self {
        Self {
            frame_id: init_frame_id,
            frame_limit,
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }

    #[inline]
    pub fn set_frame_limit(&mut self, frame_limit: f32) {
        self.frame_limit = frame_limit;
    }
}
// getters
impl FrameCounter {
    const FIF_COUNT: usize = 3;
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn frame_limit(&self) -> f32 {
        self.frame_limit
    }
    #[inline]
    pub const fn fif_count() -> usize {
        Self::FIF_COUNT
    }
    #[inline]
    pub const fn frame_labels() -> [FrameLabel; Self::FIF_COUNT] {
        [FrameLabel::A, FrameLabel::B, FrameLabel::C]
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_usize(self.frame_id as usize % Self::fif_count())
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
    /// 当前 frame slot 上一次被使用时的帧序号，在此之前的帧不会再占用这个 slot
    #[inline]
    pub fn slot_reuse_wait_value(&self) -> u64 {
        self.frame_id.saturating_sub(Self::FIF_COUNT as u64)
    }
}

/// 帧标签（A/B/C）
///
/// 表示当前处于 Frames in Flight 的哪一帧。
/// 通过 `Deref` 转换为索引 0/1/2。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameLabel {
    A,
    B,
    C,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
            Self::C => &Self::INDEX[2],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; 3] = [0, 1, 2];

    /// idx 超出范围时按 frames in flight 取模
    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx % FrameCounter::fif_count() {
            0 => Self::A,
            1 => Self::B,
            _ => Self::C,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cycle_with_frame_id() {
        let mut counter = FrameCounter::new(1, 0.0);
        let labels: Vec<_> = (0..6)
            .map(|_| {
                let label = counter.frame_label();
                counter.next_frame();
                label
            })
            .collect();
        assert_eq!(labels, vec![FrameLabel::B, FrameLabel::C, FrameLabel::A, FrameLabel::B, FrameLabel::C, FrameLabel::A]);
    }

    #[test]
    fn frame_name_contains_id_and_label() {
        let counter = FrameCounter::new(4, 60.0);
        assert_eq!(counter.frame_name(), "[F4B]");
        assert_eq!(*counter.frame_label(), 1);
    }

    #[test]
    fn slot_reuse_waits_for_three_frames_back() {
        assert_eq!(FrameCounter::new(1, 0.0).slot_reuse_wait_value(), 0);
        assert_eq!(FrameCounter::new(10, 0.0).slot_reuse_wait_value(), 7);
    }
}
