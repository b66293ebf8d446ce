/// 信頼度表示の色帯
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(score: u8) -> Self {
        match score {
            80.. => Self::High,
            60..=79 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// カメラ映像の下に出す練習メッセージ
pub fn hint_for(score: u8) -> &'static str {
    match score {
        85.. => "Excellent! Perfect form!",
        70..=84 => "Almost there! Keep trying!",
        1..=69 => "Keep practicing! Review the instructions.",
        0 => "Position your hand to start detection",
    }
}

/// ジェスチャー確認クイズで正解とみなすか
pub fn passes_check(score: u8, threshold: u8) -> bool {
    score >= threshold
}
