use std::{
    collections::VecDeque,
    mem,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Transition,
    WindowEvents,
    BusDispatch,
    Update,
    SceneDrawing,
    CloseChecks,
}

/// Measures how long each stage of a frame takes.
pub struct FrameProfiler {
    /// How many frames are remembered
    pub max_history_size: usize,
    history: VecDeque<ProfilingInfo>,
    frame_start: Instant,
    segments: Vec<(FrameStage, Duration)>,
    current_stage_start: Instant,
    current_stage: FrameStage,
}

impl FrameProfiler {
    pub fn new() -> Self {
        Self {
            // About a minute at 60 FPS
            max_history_size: 3600,
            history: VecDeque::new(),
            frame_start: Instant::now(),
            segments: vec![],
            current_stage_start: Instant::now(),
            current_stage: FrameStage::Transition,
        }
    }

    pub fn begin_frame(&mut self) {
        self.frame_start = Instant::now();
        self.segments.clear();
        self.current_stage_start = self.frame_start;
        self.current_stage = FrameStage::Transition;
    }

    pub fn next_stage(&mut self, stage: FrameStage) {
        let now = Instant::now();
        if self.current_stage != FrameStage::Transition {
            self.segments.push((
                self.current_stage,
                now.duration_since(self.current_stage_start),
            ));
        }
        self.current_stage_start = now;
        self.current_stage = stage;
    }

    pub fn finish_stage(&mut self) {
        self.next_stage(FrameStage::Transition);
    }

    pub fn finish_frame(&mut self) -> ProfilingInfo {
        self.finish_stage();
        let info = ProfilingInfo {
            total_time: Instant::now().duration_since(self.frame_start),
            segments: mem::replace(&mut self.segments, Vec::with_capacity(8)),
        };

        if self.history.len() >= self.max_history_size {
            self.history.pop_front();
        }
        self.history.push_back(info.clone());
        info
    }

    /// Profiling info of the last frames, oldest first.
    pub fn history(&self) -> &VecDeque<ProfilingInfo> {
        &self.history
    }

    pub fn last_frame(&self) -> Option<&ProfilingInfo> {
        self.history.back()
    }

    /// Average time of the remembered frames.
    pub fn average_frame_time(&self) -> Duration {
        if self.history.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.history.iter().map(|info| info.total_time).sum();
        total / self.history.len() as u32
    }
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ProfilingInfo {
    pub total_time: Duration,
    pub segments: Vec<(FrameStage, Duration)>,
}

impl ProfilingInfo {
    pub fn stage_time(&self, stage: FrameStage) -> Duration {
        self.segments
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, time)| *time)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_recorded_in_order() {
        let mut profiler = FrameProfiler::new();
        profiler.max_history_size = 2;

        for _ in 0..3 {
            profiler.begin_frame();
            profiler.next_stage(FrameStage::WindowEvents);
            profiler.next_stage(FrameStage::Update);
            let info = profiler.finish_frame();
            let stages = info.segments.iter().map(|(s, _)| *s).collect::<Vec<_>>();
            assert_eq!(stages, vec![FrameStage::WindowEvents, FrameStage::Update]);
            assert!(info.total_time >= info.stage_time(FrameStage::Update));
        }

        assert_eq!(profiler.history().len(), 2);
        assert!(profiler.last_frame().is_some());
    }
}
