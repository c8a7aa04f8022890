/// 一份合格的解决方案必须包含的章节标记
pub const REQUIRED_SECTIONS: [&str; 2] = ["Overview", "Implementation Plan"];

/// 无法得到有效方案文本时的兜底内容
pub const FALLBACK_SOLUTION: &str = "Overview\n\nA detailed guide could not be generated for this problem right now.\n\nImplementation Plan\n\n1. Validate the problem with a handful of people in the target audience.\n2. Build the smallest digital product that solves it.\n3. Collect feedback and iterate.\n\nPlease try again in a moment for a complete guide.";
