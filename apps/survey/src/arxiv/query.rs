//! Search expressions for the arXiv query API.

/// Categories searched when looking for AI/ML surveys.
const AI_ML_CATEGORIES: [&str; 6] = ["cs.AI", "cs.LG", "cs.CV", "cs.CL", "cs.NE", "stat.ML"];

const SURVEY_TITLE_CLAUSE: &str = r#"(ti:comprehensive OR ti:survey OR ti:"a review")"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Relevance,
    SubmittedDate,
}

impl SortBy {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::SubmittedDate => "submittedDate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArxivQuery {
    pub search_query: String,
    pub sort_by: SortBy,
    pub max_results: usize,
}

/// Double quotes would end a phrase early, so they are dropped from user input.
fn sanitize(term: &str) -> String {
    term.replace('"', "").trim().to_string()
}

/// Quotes multi-word terms so they match as a phrase.
fn term_clause(term: &str) -> String {
    let term = sanitize(term);
    if term.contains(char::is_whitespace) {
        format!("\"{term}\"")
    } else {
        term
    }
}

/// Surveys whose title contains the exact phrase `q`.
pub fn title_survey_query(q: &str, max_results: usize) -> ArxivQuery {
    ArxivQuery {
        search_query: format!("ti:\"{}\" AND {SURVEY_TITLE_CLAUSE}", sanitize(q)),
        sort_by: SortBy::Relevance,
        max_results,
    }
}

/// Surveys or reviews in the AI/ML categories mentioning every keyword.
pub fn ai_ml_survey_query(keywords: &[String], max_results: usize) -> ArxivQuery {
    let categories = AI_ML_CATEGORIES
        .iter()
        .map(|c| format!("cat:{c}"))
        .collect::<Vec<_>>()
        .join(" OR ");

    let keyword_clause = keywords
        .iter()
        .map(|k| term_clause(k))
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(" AND ");

    let search_query = if keyword_clause.is_empty() {
        format!("({categories}) AND (survey OR review)")
    } else {
        format!("({categories}) AND ({keyword_clause}) AND (survey OR review)")
    };

    ArxivQuery {
        search_query,
        sort_by: SortBy::Relevance,
        max_results,
    }
}

/// Candidate pool for personalised recommendations: ML/DL surveys.
pub fn recommendation_pool_query(max_results: usize) -> ArxivQuery {
    ArxivQuery {
        search_query: r#"(abs:"deep learning" OR abs:"machine learning") AND (ti:survey OR ti:comprehensive OR ti:"a review")"#
            .to_string(),
        sort_by: SortBy::Relevance,
        max_results,
    }
}

/// Maps an interest field (English or Korean label) to its arXiv category.
/// Unknown fields fall back to `cs.AI`.
pub fn category_for_field(field: &str) -> &'static str {
    match field.trim() {
        "Deep Learning" | "딥러닝" | "Machine Learning" | "머신러닝" | "Reinforcement Learning"
        | "강화학습" | "Transfer Learning" | "전이학습" | "Meta Learning" | "메타러닝"
        | "Federated Learning" | "연합학습" => "cs.LG",
        "Computer Vision" | "컴퓨터비전" | "Image Classification" | "이미지분류"
        | "Object Detection" | "객체탐지" | "Image Segmentation" | "영상분할" | "3D Vision"
        | "3D 비전" | "Video Understanding" | "비디오이해" => "cs.CV",
        "NLP" | "자연어처리" | "Natural Language Processing" | "LLM" | "Large Language Models"
        | "Machine Translation" | "기계번역" | "Question Answering" | "질의응답"
        | "Text Generation" | "텍스트생성" | "Sentiment Analysis" | "감성분석" => "cs.CL",
        "Generative Models" | "생성모델" | "GAN" | "Generative Adversarial Networks" | "VAE"
        | "Variational Autoencoders" | "Diffusion Models" | "확산모델" => "cs.LG",
        "Graph Neural Networks" | "그래프신경망" => "cs.LG",
        "Knowledge Graphs" | "지식그래프" => "cs.AI",
        "Speech Recognition" | "음성인식" | "Speech Synthesis" | "음성합성"
        | "Audio Processing" | "오디오처리" => "eess.AS",
        "Time Series" | "시계열" | "Forecasting" | "예측모델" => "stat.ML",
        "Recommender Systems" | "추천시스템" | "Collaborative Filtering" | "협업필터링" => "cs.IR",
        "Robotics" | "로보틱스" | "Autonomous Driving" | "자율주행" => "cs.RO",
        "Control Theory" | "제어이론" => "cs.SY",
        "Optimization" | "최적화" => "math.OC",
        "Neural Network Theory" | "신경망이론" => "cs.LG",
        "Explainable AI" | "설명가능AI" | "Game AI" | "게임AI" | "AI" => "cs.AI",
        "Medical AI" | "의료AI" | "Financial AI" | "금융AI" | "Edge AI" | "엣지AI"
        | "Multimodal Learning" | "멀티모달" => "cs.LG",
        _ => "cs.AI",
    }
}

/// Newest surveys or reviews in the categories behind the given interest fields.
pub fn category_survey_query(fields: &[String], max_results: usize) -> ArxivQuery {
    let mut categories: Vec<&str> = Vec::new();
    for field in fields {
        let category = category_for_field(field);
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    if categories.is_empty() {
        categories.push("cs.AI");
    }

    let clause = categories
        .iter()
        .map(|c| format!("cat:{c}"))
        .collect::<Vec<_>>()
        .join(" OR ");

    ArxivQuery {
        search_query: format!("({clause}) AND (survey OR review)"),
        sort_by: SortBy::SubmittedDate,
        max_results,
    }
}
