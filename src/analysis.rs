use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// The job families a resume is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    AnalistaFinanceiro,
    ContasPagar,
    ContasReceber,
    AnalistaPrecificacao,
    Custos,
}

impl JobType {
    pub const ALL: [JobType; 5] = [
        JobType::AnalistaFinanceiro,
        JobType::ContasPagar,
        JobType::ContasReceber,
        JobType::AnalistaPrecificacao,
        JobType::Custos,
    ];

    pub fn key(self) -> &'static str {
        match self {
            JobType::AnalistaFinanceiro => "analista_financeiro",
            JobType::ContasPagar => "contas_pagar",
            JobType::ContasReceber => "contas_receber",
            JobType::AnalistaPrecificacao => "analista_precificacao",
            JobType::Custos => "custos",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobType::AnalistaFinanceiro => "Analista Financeiro",
            JobType::ContasPagar => "Contas a Pagar",
            JobType::ContasReceber => "Contas a Receber",
            JobType::AnalistaPrecificacao => "Analista de Precificação",
            JobType::Custos => "Custos",
        }
    }

    pub fn from_key(key: &str) -> Option<JobType> {
        JobType::ALL.into_iter().find(|j| j.key().eq_ignore_ascii_case(key))
    }

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            JobType::AnalistaFinanceiro => &[
                "financeiro", "financial", "análise", "analysis", "demonstrações", "statements",
                "balanço", "balance", "dre", "fluxo de caixa", "cash flow", "orçamento", "budget",
                "planejamento", "planning", "controladoria", "controlling", "excel", "powerbi",
                "tableau", "sql", "python", "r", "sap", "oracle", "contabilidade", "accounting",
                "auditoria", "audit", "compliance", "risco", "risk", "investimento", "investment",
            ],
            JobType::ContasPagar => &[
                "contas a pagar", "accounts payable", "fornecedores", "suppliers", "pagamentos",
                "payments", "conciliação", "reconciliation", "fluxo de caixa", "cash flow",
                "vencimentos", "due dates", "negociação", "negotiation", "desconto", "discount",
                "juros", "interest", "multa", "penalty", "sap", "oracle", "totvs", "protheus",
                "excel", "planilhas", "spreadsheets", "processo", "process", "rotina", "routine",
            ],
            JobType::ContasReceber => &[
                "contas a receber", "accounts receivable", "clientes", "customers", "cobrança",
                "collection", "inadimplência", "default", "crédito", "credit", "análise de crédito",
                "credit analysis", "limite", "limit", "faturamento", "billing", "nota fiscal",
                "invoice", "recebimentos", "receipts", "conciliação", "reconciliation", "spc",
                "serasa", "protesto", "protest", "negociação", "negotiation", "acordo", "agreement",
            ],
            JobType::AnalistaPrecificacao => &[
                "precificação", "pricing", "preço", "price", "margem", "margin", "custo", "cost",
                "markup", "competitividade", "competitiveness", "mercado", "market", "pesquisa",
                "research", "análise", "analysis", "estratégia", "strategy", "produto", "product",
                "serviço", "service", "valor", "value", "elasticidade", "elasticity", "demanda",
                "demand", "oferta", "supply", "concorrência", "competition", "benchmark",
            ],
            JobType::Custos => &[
                "custos", "costs", "custeio", "costing", "abc", "activity based costing",
                "centro de custo", "cost center", "rateio", "allocation", "apropriação",
                "appropriation", "variação", "variance", "padrão", "standard", "orçamento",
                "budget", "controle", "control", "redução", "reduction", "otimização",
                "optimization", "eficiência", "efficiency", "produtividade", "productivity",
                "margem", "margin", "rentabilidade", "profitability", "break even",
            ],
        }
    }

    pub fn tips(self) -> &'static [&'static str] {
        match self {
            JobType::AnalistaFinanceiro => &[
                "Destaque experiências com análise de demonstrações financeiras",
                "Mencione conhecimentos em planejamento e controle orçamentário",
                "Inclua experiências com análise de investimentos",
                "Destaque habilidades em modelagem financeira",
            ],
            JobType::ContasPagar => &[
                "Enfatize experiências com gestão de fornecedores",
                "Mencione conhecimentos em fluxo de caixa",
                "Destaque habilidades em negociação de prazos e descontos",
                "Inclua experiências com conciliação bancária",
            ],
            JobType::ContasReceber => &[
                "Destaque experiências com análise de crédito",
                "Mencione conhecimentos em cobrança e recuperação",
                "Inclua experiências com gestão de inadimplência",
                "Enfatize habilidades em negociação",
            ],
            JobType::AnalistaPrecificacao => &[
                "Destaque experiências com análise de mercado",
                "Mencione conhecimentos em estratégias de pricing",
                "Inclua experiências com análise de competitividade",
                "Enfatize habilidades analíticas e de pesquisa",
            ],
            JobType::Custos => &[
                "Destaque experiências com custeio ABC",
                "Mencione conhecimentos em centro de custos",
                "Inclua experiências com análise de variações",
                "Enfatize habilidades em otimização de processos",
            ],
        }
    }
}

pub const TECHNICAL_SKILLS: &[&str] = &[
    "excel", "powerbi", "tableau", "sql", "python", "r", "sap", "oracle", "totvs", "protheus",
    "microsiga", "senior", "datasul", "rm", "logix", "access", "vba",
];

pub const SOFT_SKILLS: &[&str] = &[
    "comunicação", "communication", "liderança", "leadership", "trabalho em equipe", "teamwork",
    "organização", "organization", "proatividade", "proactive", "analítico", "analytical",
    "detalhista", "detail oriented", "responsabilidade", "responsibility", "pontualidade",
    "punctuality", "flexibilidade", "flexibility",
];

pub const GENERAL_TIPS: &[&str] = &[
    "Use palavras-chave específicas da área financeira",
    "Quantifique seus resultados sempre que possível",
    "Destaque experiências com sistemas ERP (SAP, Oracle, TOTVS)",
    "Mencione conhecimentos em Excel avançado e ferramentas de BI",
    "Inclua certificações relevantes (CRC, CFA, etc.)",
];

const STOPWORDS: &[&str] = &[
    "que", "com", "não", "uma", "para", "por", "mais", "das", "dos", "como", "mas", "foi", "ele",
    "ela", "seu", "sua", "seus", "suas", "nos", "nas", "aos", "pelo", "pela", "pelos", "pelas",
    "até", "isso", "isto", "este", "esta", "esse", "essa", "entre", "sobre", "também", "quando",
    "muito", "nem", "eles", "elas", "você", "tem", "ter", "era", "são", "está", "meu", "minha",
    "sem", "mesmo", "depois", "ainda", "num", "numa", "qual", "lhe", "nós", "ser", "estar",
];

// --- Text heuristics ---

/// Lowercase, strip everything but letters, drop short words and stopwords,
/// then fold simple plurals so "custos" and "custo" meet.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(w))
        .map(fold_plural)
        .collect()
}

fn fold_plural(word: &str) -> String {
    if word.chars().count() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Percentage of distinct keyword tokens present in the resume.
pub fn keyword_score(resume: &HashSet<String>, keywords: &[&str]) -> f64 {
    let wanted: HashSet<String> = keywords.iter().flat_map(|k| tokenize(k)).collect();
    if resume.is_empty() || wanted.is_empty() {
        return 0.0;
    }
    let matched = wanted.iter().filter(|k| resume.contains(*k)).count();
    matched as f64 / wanted.len() as f64 * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Junior,
    Pleno,
    Senior,
    Unknown,
}

impl ExperienceLevel {
    pub fn label(self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "Júnior",
            ExperienceLevel::Pleno => "Pleno",
            ExperienceLevel::Senior => "Sênior",
            ExperienceLevel::Unknown => "Não identificado",
        }
    }

    fn from_years(years: u32) -> Self {
        match years {
            5.. => ExperienceLevel::Senior,
            2..=4 => ExperienceLevel::Pleno,
            _ => ExperienceLevel::Junior,
        }
    }
}

const EXPERIENCE_PATTERNS: [&str; 5] = [
    r"(\d+)\s*anos?\s*de\s*experiência",
    r"(\d+)\s*years?\s*of\s*experience",
    r"experiência\s*de\s*(\d+)\s*anos?",
    r"(\d+)\s*anos?\s*atuando",
    r"(\d+)\s*anos?\s*trabalhando",
];

/// Largest "N years of experience" style figure in the text, and the
/// seniority it implies.
pub fn experience(text: &str) -> (u32, ExperienceLevel) {
    let lower = text.to_lowercase();
    let max_years = EXPERIENCE_PATTERNS
        .iter()
        .filter_map(|p| regex::Regex::new(p).ok())
        .flat_map(|re| {
            re.captures_iter(&lower)
                .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
                .collect::<Vec<_>>()
        })
        .max();

    match max_years {
        Some(years) => (years, ExperienceLevel::from_years(years)),
        None => (0, ExperienceLevel::Unknown),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Education {
    pub degree: bool,
    pub postgraduate: bool,
    pub mba: bool,
    pub relevant_area: bool,
}

pub fn education(text: &str) -> Education {
    let lower = text.to_lowercase();
    let any = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    Education {
        degree: any(&[
            "graduação", "graduado", "bacharel", "licenciatura", "superior completo",
            "formado em", "degree", "bachelor", "graduated",
        ]),
        postgraduate: any(&[
            "pós-graduação", "pós graduação", "especialização", "postgraduate",
            "especialista em", "graduate certificate",
        ]),
        mba: any(&["mba", "master of business administration", "mestrado profissional"]),
        relevant_area: any(&[
            "administração", "economia", "contabilidade", "ciências contábeis", "engenharia",
            "matemática", "estatística", "finanças", "business", "accounting", "economics",
            "finance", "engineering", "mathematics",
        ]),
    }
}

// --- Report ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeAnalysis {
    pub job_scores: BTreeMap<JobType, f64>,
    pub technical_score: f64,
    pub soft_skills_score: f64,
    pub experience_years: u32,
    pub experience_level: ExperienceLevel,
    pub education: Education,
    /// Mean star rating across job types, 0 to 5.
    pub overall_rating: f64,
    pub recommendations: Vec<String>,
}

impl ResumeAnalysis {
    /// 20% keyword coverage is worth one star.
    pub fn stars(&self, job: JobType) -> f64 {
        let score = self.job_scores.get(&job).copied().unwrap_or(0.0);
        round1((score / 20.0).clamp(0.0, 5.0))
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn analyze_text(text: &str) -> Result<ResumeAnalysis> {
    if text.trim().is_empty() {
        bail!("Resume text is empty");
    }

    let tokens: HashSet<String> = tokenize(text).into_iter().collect();
    let job_scores: BTreeMap<JobType, f64> = JobType::ALL
        .into_iter()
        .map(|job| (job, round1(keyword_score(&tokens, job.keywords()))))
        .collect();
    let overall = job_scores
        .values()
        .map(|score| (score / 20.0).clamp(0.0, 5.0))
        .sum::<f64>()
        / job_scores.len() as f64;
    let (experience_years, experience_level) = experience(text);

    let mut analysis = ResumeAnalysis {
        job_scores,
        technical_score: round1(keyword_score(&tokens, TECHNICAL_SKILLS)),
        soft_skills_score: round1(keyword_score(&tokens, SOFT_SKILLS)),
        experience_years,
        experience_level,
        education: education(text),
        overall_rating: round1(overall),
        recommendations: Vec::new(),
    };
    analysis.recommendations = recommendations(&analysis);
    debug!(
        tokens = tokens.len(),
        overall = analysis.overall_rating,
        years = analysis.experience_years,
        "resume analyzed"
    );
    Ok(analysis)
}

pub fn recommendations(analysis: &ResumeAnalysis) -> Vec<String> {
    let mut out: Vec<String> = analysis
        .job_scores
        .iter()
        .filter(|(_, score)| **score < 30.0)
        .map(|(job, _)| {
            format!(
                "Para {}: Adicione mais palavras-chave específicas da área, como experiências com \
                 sistemas ERP, análises financeiras e processos específicos.",
                job.label()
            )
        })
        .collect();

    if analysis.experience_years < 2 {
        out.push(
            "Destaque projetos acadêmicos, estágios e cursos que demonstrem conhecimento prático \
             na área financeira."
                .to_string(),
        );
    }
    if !analysis.education.degree {
        out.push(
            "Considere completar um curso superior em área relacionada (Administração, Economia, \
             Contabilidade)."
                .to_string(),
        );
    }
    if !analysis.education.postgraduate && analysis.experience_years >= 3 {
        out.push(
            "Para posições mais seniores, considere fazer uma pós-graduação ou MBA em Finanças ou \
             Controladoria."
                .to_string(),
        );
    }
    if analysis.technical_score < 40.0 {
        out.push(
            "Desenvolva habilidades em ferramentas como Excel avançado, Power BI, SQL e sistemas \
             ERP (SAP, Oracle, TOTVS)."
                .to_string(),
        );
    }

    if out.is_empty() {
        out.push(
            "Seu currículo está bem estruturado! Continue atualizando com novas experiências e \
             certificações."
                .to_string(),
        );
    }
    out
}

// --- Input ---

/// Plain text for anything but `.pdf`.
pub fn read_resume(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read resume: {}", path.display()));
    }

    let doc = lopdf::Document::load(path)
        .with_context(|| format!("Failed to open PDF: {}", path.display()))?;
    let mut text = String::new();
    for page in doc.get_pages().keys() {
        match doc.extract_text(&[*page]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push(' ');
            }
            Err(e) => warn!(page, "Failed to extract text from PDF page: {}", e),
        }
    }
    if text.trim().is_empty() {
        bail!("No text extracted from {}", path.display());
    }
    Ok(text)
}

pub fn analyze_file(path: &Path) -> Result<ResumeAnalysis> {
    let text = read_resume(path)?;
    analyze_text(&text).with_context(|| format!("Failed to analyze {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "Maria Souza\n\
        Analista financeira com 6 anos de experiência em contas a pagar, fluxo de caixa,\n\
        conciliação bancária e pagamentos a fornecedores. Negociação de vencimentos e descontos.\n\
        Ferramentas: Excel, SQL, SAP, Oracle, TOTVS Protheus, PowerBI.\n\
        Formação: Bacharel em Ciências Contábeis. MBA em Controladoria.\n\
        Comunicação, organização e trabalho em equipe.";

    fn tokens(text: &str) -> HashSet<String> {
        tokenize(text).into_iter().collect()
    }

    #[test]
    fn test_tokenize_drops_noise_and_folds_plurals() {
        assert_eq!(
            tokenize("Custos, 2023: análise de CUSTO e as margens!"),
            vec!["custo", "análise", "custo", "margen"]
        );
        assert!(tokenize("de a o e").is_empty());
    }

    #[test]
    fn test_keyword_score_counts_distinct_keywords() {
        let resume = tokens("fluxo de caixa e orçamento");
        // "fluxo", "caixa", "orçamento", "budget"
        let score = keyword_score(&resume, &["fluxo de caixa", "orçamento", "budget"]);
        assert_eq!(score, 75.0);

        assert_eq!(keyword_score(&HashSet::new(), &["excel"]), 0.0);
        assert_eq!(keyword_score(&resume, &["r"]), 0.0);
    }

    #[test]
    fn test_experience_takes_largest_figure() {
        assert_eq!(experience("3 anos atuando; 7 years of experience"), (7, ExperienceLevel::Senior));
        assert_eq!(experience("Experiência de 2 anos em cobrança"), (2, ExperienceLevel::Pleno));
        assert_eq!(experience("1 ano de experiência"), (1, ExperienceLevel::Junior));
        assert_eq!(experience("recém formado"), (0, ExperienceLevel::Unknown));
    }

    #[test]
    fn test_education_flags() {
        let edu = education("Bacharel em Economia, pós-graduação em Finanças");
        assert!(edu.degree);
        assert!(edu.postgraduate);
        assert!(!edu.mba);
        assert!(edu.relevant_area);

        assert_eq!(education("Ensino médio"), Education::default());
    }

    #[test]
    fn test_analyze_strong_payables_resume() {
        let analysis = analyze_text(RESUME).unwrap();

        let payables = analysis.job_scores[&JobType::ContasPagar];
        let pricing = analysis.job_scores[&JobType::AnalistaPrecificacao];
        assert!(payables > pricing, "payables {} vs pricing {}", payables, pricing);
        assert!(payables >= 30.0);
        assert_eq!(analysis.experience_years, 6);
        assert_eq!(analysis.experience_level, ExperienceLevel::Senior);
        assert!(analysis.education.degree);
        assert!(analysis.education.mba);
        assert!(analysis.technical_score >= 40.0);
        assert!(analysis.overall_rating > 0.0 && analysis.overall_rating <= 5.0);
        assert_eq!(analysis.stars(JobType::ContasPagar), round1(payables / 20.0));

        assert!(!analysis.recommendations.iter().any(|r| r.starts_with("Para Contas a Pagar")));
        assert!(analysis.recommendations.iter().any(|r| r.contains("pós-graduação")));
    }

    #[test]
    fn test_analyze_thin_resume_gets_every_hint() {
        let analysis = analyze_text("Procuro meu primeiro emprego.").unwrap();
        assert_eq!(analysis.overall_rating, 0.0);
        assert_eq!(analysis.experience_level, ExperienceLevel::Unknown);
        // one per job type, plus experience, degree and tools
        assert_eq!(analysis.recommendations.len(), JobType::ALL.len() + 3);
    }

    #[test]
    fn test_well_rounded_resume_gets_praise() {
        let mut analysis = analyze_text(RESUME).unwrap();
        analysis.job_scores.values_mut().for_each(|s| *s = 80.0);
        analysis.education.postgraduate = true;
        let recs = recommendations(&analysis);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].starts_with("Seu currículo está bem estruturado"));
    }

    #[test]
    fn test_empty_text_is_an_error() {
        assert!(analyze_text("   \n").is_err());
    }

    #[test]
    fn test_analyze_file_reads_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.txt");
        std::fs::write(&path, RESUME).unwrap();
        assert_eq!(analyze_file(&path).unwrap(), analyze_text(RESUME).unwrap());

        assert!(analyze_file(&dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_job_type_keys() {
        for job in JobType::ALL {
            assert_eq!(JobType::from_key(job.key()), Some(job));
            assert_eq!(job.tips().len(), 4);
        }
        assert_eq!(JobType::from_key("marketing"), None);
    }
}
