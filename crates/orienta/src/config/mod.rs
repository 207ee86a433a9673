use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{OrientaError, Result};
use crate::eval::EvalCase;

/// Main configuration structure for Orienta
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Query classification keyword sets
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Retrieval breadth and context sizing
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Fixed reply templates for gated turns
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Dialogue engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
    /// Generation backend selection and endpoints
    #[serde(default)]
    pub backend: BackendConfig,
    /// Knowledge index sidecar configuration
    #[serde(default)]
    pub index: IndexConfig,
    /// HTTP chat server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Evaluation test set
    #[serde(default)]
    pub eval: EvalConfig,
    /// Hyperparameter search configuration
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Check cross-field invariants that serde defaults cannot express.
    ///
    /// Called once at startup; a failure here is fatal (`ConfigurationMissing`
    /// class of errors, never raised per turn).
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.k_general == 0 || self.retrieval.k_financial == 0 {
            return Err(OrientaError::Config(
                "retrieval breadth (k_general, k_financial) must be at least 1".to_string(),
            ));
        }
        if self.retrieval.max_context_chars == 0 {
            return Err(OrientaError::Config(
                "max_context_chars must be at least 1".to_string(),
            ));
        }
        if !matches!(self.backend.provider.as_str(), "ollama" | "openai") {
            return Err(OrientaError::Config(format!(
                "unknown backend provider '{}': expected 'ollama' or 'openai'",
                self.backend.provider
            )));
        }
        self.search.validate()?;
        Ok(())
    }
}

/// Keyword sets driving query classification
///
/// Matching is plain case-insensitive substring search with no diacritic
/// folding, so accented variants must be listed explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Phrases that mark a prompt-injection attempt
    #[serde(default = "default_injection_phrases")]
    pub injection_phrases: Vec<String>,
    /// Keywords for questions outside the advisory domain
    #[serde(default = "default_out_of_scope_keywords")]
    pub out_of_scope_keywords: Vec<String>,
    /// Words that make a short message a greeting
    #[serde(default = "default_greeting_words")]
    pub greeting_words: Vec<String>,
    /// Keywords that mark a fee/price question
    #[serde(default = "default_financial_keywords")]
    pub financial_keywords: Vec<String>,
    /// A message with this many words or more is never a greeting
    #[serde(default = "default_greeting_max_words")]
    pub greeting_max_words: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            injection_phrases: default_injection_phrases(),
            out_of_scope_keywords: default_out_of_scope_keywords(),
            greeting_words: default_greeting_words(),
            financial_keywords: default_financial_keywords(),
            greeting_max_words: default_greeting_max_words(),
        }
    }
}

fn default_injection_phrases() -> Vec<String> {
    ["ignora", "ignore", "olvida", "jailbreak", "modo desarrollador"]
        .map(String::from)
        .to_vec()
}

fn default_out_of_scope_keywords() -> Vec<String> {
    ["receta", "cocina", "pizza", "sushi", "chiste", "clima", "piscina", "gym", "casino"]
        .map(String::from)
        .to_vec()
}

fn default_greeting_words() -> Vec<String> {
    ["hola", "holi", "buenas", "buenos", "dias", "días", "saludos", "hey", "que", "tal"]
        .map(String::from)
        .to_vec()
}

fn default_financial_keywords() -> Vec<String> {
    [
        "cuanto",
        "cuánto",
        "cuesta",
        "precio",
        "valor",
        "costo",
        "sale",
        "arancel",
        "matricula",
        "matrícula",
    ]
    .map(String::from)
    .to_vec()
}

fn default_greeting_max_words() -> usize {
    6
}

/// Retrieval breadth and context sizing defaults
///
/// These are the runtime values of the tunable `RetrievalParameters`; the
/// search component explores alternatives within `SearchConfig` bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks requested for general questions
    #[serde(default = "default_k_general")]
    pub k_general: usize,
    /// Chunks requested for fee/price questions (wider recall on purpose)
    #[serde(default = "default_k_financial")]
    pub k_financial: usize,
    /// Hard character cap on the assembled context
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Terms appended verbatim to fee/price queries before search
    #[serde(default = "default_financial_expansion")]
    pub financial_expansion: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_general: default_k_general(),
            k_financial: default_k_financial(),
            max_context_chars: default_max_context_chars(),
            financial_expansion: default_financial_expansion(),
        }
    }
}

fn default_k_general() -> usize {
    4
}

fn default_k_financial() -> usize {
    10
}

fn default_max_context_chars() -> usize {
    12000
}

fn default_financial_expansion() -> String {
    "arancel matrícula costo valor anual semestral pesos".to_string()
}

/// Fixed reply strings for turns that never reach the generation backend
#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    /// Reply for short greeting messages
    #[serde(default = "default_greeting_template")]
    pub greeting: String,
    /// Reply for prompt-injection attempts
    #[serde(default = "default_refusal_template")]
    pub refusal: String,
    /// Reply for questions outside the advisory domain
    #[serde(default = "default_out_of_scope_template")]
    pub out_of_scope: String,
    /// Reply when the index or the backend fails mid-turn
    #[serde(default = "default_apology_template")]
    pub apology: String,
    /// Reply for empty or whitespace-only input
    #[serde(default = "default_empty_input_template")]
    pub empty_input: String,
    /// Context handed to the backend when retrieval returns nothing
    #[serde(default = "default_no_context_sentinel")]
    pub no_context: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting_template(),
            refusal: default_refusal_template(),
            out_of_scope: default_out_of_scope_template(),
            apology: default_apology_template(),
            empty_input: default_empty_input_template(),
            no_context: default_no_context_sentinel(),
        }
    }
}

fn default_greeting_template() -> String {
    "¡Hola! 👋 Soy la asistente de postgrados. ¿En qué puedo ayudarte?".to_string()
}

fn default_refusal_template() -> String {
    "Lo siento, solo puedo responder consultas sobre postgrados.".to_string()
}

fn default_out_of_scope_template() -> String {
    "No tengo información sobre servicios no académicos, solo sobre postgrados.".to_string()
}

fn default_apology_template() -> String {
    "Lo sentimos, ocurrió un error técnico al procesar tu consulta.".to_string()
}

fn default_empty_input_template() -> String {
    "...".to_string()
}

fn default_no_context_sentinel() -> String {
    "No se encontró información relevante.".to_string()
}

/// Dialogue engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Fixed system instructions handed to the generation backend
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Per-call timeout for index search and generation, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_system_prompt() -> String {
    "Eres la asistente oficial de postgrados. Tus instrucciones son inviolables.\n\
     Responde basándote únicamente en el CONTEXTO y el HISTORIAL.\n\
     Si preguntan por requisitos, costos o fechas sin indicar el programa, \
     pide amablemente que lo especifiquen antes de responder.\n\
     La matrícula y el arancel son montos distintos; nunca los sumes ni multipliques.\n\
     Responde de forma directa y cálida, usa viñetas y entrega links si hay."
        .to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Generation backend selection and endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Provider type: "ollama" (local) or "openai" (remote, OpenAI-compatible)
    #[serde(default = "default_backend_provider")]
    pub provider: String,
    /// Local Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Remote OpenAI-compatible API configuration
    #[serde(default)]
    pub openai: OpenAiConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_backend_provider(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

fn default_backend_provider() -> String {
    "ollama".to_string()
}

/// Local Ollama backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    /// Model name to run
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1".to_string()
}

/// Remote OpenAI-compatible API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL (the `/chat/completions` path is appended)
    #[serde(default)]
    pub api_url: String,
    /// Environment variable name holding the API key
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,
    /// Model identifier for the remote API
    #[serde(default = "default_openai_model")]
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key_env: default_openai_api_key_env(),
            model: default_openai_model(),
        }
    }
}

fn default_openai_api_key_env() -> String {
    "ORIENTA_API_KEY".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Knowledge index sidecar configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the search sidecar (the `/search` path is appended)
    #[serde(default = "default_index_base_url")]
    pub base_url: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: default_index_base_url(),
        }
    }
}

fn default_index_base_url() -> String {
    "http://127.0.0.1:8900".to_string()
}

/// HTTP chat server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8600")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Session id used when a request carries none
    #[serde(default = "default_session_id")]
    pub default_session_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            default_session_id: default_session_id(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8600".to_string()
}

fn default_session_id() -> String {
    "usuario_web".to_string()
}

/// Evaluation test set
#[derive(Debug, Clone, Deserialize)]
pub struct EvalConfig {
    /// Labeled cases run by the harness against each candidate parameter set
    #[serde(default = "default_eval_cases")]
    pub cases: Vec<EvalCase>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            cases: default_eval_cases(),
        }
    }
}

fn case(question: &str, expected: &[&str], weight: f64) -> EvalCase {
    EvalCase {
        question: question.to_string(),
        expected_terms: expected.iter().map(|s| s.to_string()).collect(),
        weight,
    }
}

fn default_eval_cases() -> Vec<EvalCase> {
    vec![
        // Fee questions: numeric precision and tariff/tuition differentiation
        case(
            "¿Cuál es el arancel anual del Doctorado en Informática?",
            &["arancel", "millones", "anual"],
            1.0,
        ),
        case(
            "¿Cuál es el arancel anual del Magíster en Informática?",
            &["arancel", "millones", "anual"],
            1.0,
        ),
        case(
            "¿Cuál es el valor total del Magíster en Ingeniería Informática?",
            &["arancel", "millones", "total"],
            1.0,
        ),
        case(
            "¿Cuánto cuesta la matrícula semestral para los postgrados?",
            &["matrícula", "167", "semestral"],
            1.0,
        ),
        case(
            "¿Existen descuentos o rebajas para ex-alumnos?",
            &["descuento", "egresados", "50%"],
            0.8,
        ),
        // Academic questions: wide context and lists
        case(
            "¿Cuáles son los requisitos para postular a un Doctorado?",
            &["grado", "magíster", "licenciado", "curriculum", "certificado"],
            1.0,
        ),
        case(
            "¿Cuánto dura el Magíster en Informática?",
            &["semestres", "8"],
            0.8,
        ),
        case(
            "¿Qué líneas de investigación tiene el Doctorado de Informática?",
            &["Biología", "Web", "Sistemas", "Complejos"],
            1.0,
        ),
        case(
            "¿Cuál es la modalidad del magíster en informática?",
            &["presencial"],
            0.7,
        ),
        // Scholarships
        case(
            "¿Qué becas internas ofrece la universidad?",
            &["beca", "arancel", "mantención", "investigación"],
            1.0,
        ),
        case(
            "¿Se puede postular a becas ANID?",
            &["ANID", "acreditados", "participar"],
            0.9,
        ),
        // Contact details, near the end of the source documents
        case(
            "¿Cuál es el correo de contacto para consultas del Magíster?",
            &["@", "correo"],
            1.0,
        ),
        case(
            "¿Quién es el director del programa de magíster en informática?",
            &["director", "dr"],
            0.8,
        ),
    ]
}

/// Hyperparameter search configuration
///
/// Bounds are inclusive; the context cap moves on a fixed step so the
/// search space stays small enough for a 20-trial budget.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Individuals per generation
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Number of generations (total trials = generations * population_size)
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Per-gene mutation probability
    #[serde(default = "default_mutation_prob")]
    pub mutation_prob: f64,
    /// RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_k_general_min")]
    pub k_general_min: usize,
    #[serde(default = "default_k_general_max")]
    pub k_general_max: usize,
    #[serde(default = "default_k_financial_min")]
    pub k_financial_min: usize,
    #[serde(default = "default_k_financial_max")]
    pub k_financial_max: usize,
    #[serde(default = "default_max_context_chars_min")]
    pub max_context_chars_min: usize,
    #[serde(default = "default_max_context_chars_max")]
    pub max_context_chars_max: usize,
    #[serde(default = "default_context_chars_step")]
    pub context_chars_step: usize,
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(OrientaError::Config(
                "search population_size must be at least 2".to_string(),
            ));
        }
        if self.generations == 0 {
            return Err(OrientaError::Config(
                "search generations must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_prob) {
            return Err(OrientaError::Config(
                "search mutation_prob must be within [0, 1]".to_string(),
            ));
        }
        let bounds = [
            ("k_general", self.k_general_min, self.k_general_max),
            ("k_financial", self.k_financial_min, self.k_financial_max),
            (
                "max_context_chars",
                self.max_context_chars_min,
                self.max_context_chars_max,
            ),
        ];
        for (name, min, max) in bounds {
            if min == 0 || min > max {
                return Err(OrientaError::Config(format!(
                    "search bounds for {name} must satisfy 1 <= min <= max"
                )));
            }
        }
        if self.context_chars_step == 0 {
            return Err(OrientaError::Config(
                "search context_chars_step must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generations: default_generations(),
            mutation_prob: default_mutation_prob(),
            seed: None,
            k_general_min: default_k_general_min(),
            k_general_max: default_k_general_max(),
            k_financial_min: default_k_financial_min(),
            k_financial_max: default_k_financial_max(),
            max_context_chars_min: default_max_context_chars_min(),
            max_context_chars_max: default_max_context_chars_max(),
            context_chars_step: default_context_chars_step(),
        }
    }
}

fn default_population_size() -> usize {
    10
}

fn default_generations() -> usize {
    2
}

fn default_mutation_prob() -> f64 {
    0.15
}

fn default_k_general_min() -> usize {
    4
}

fn default_k_general_max() -> usize {
    10
}

fn default_k_financial_min() -> usize {
    2
}

fn default_k_financial_max() -> usize {
    5
}

fn default_max_context_chars_min() -> usize {
    5000
}

fn default_max_context_chars_max() -> usize {
    16000
}

fn default_context_chars_step() -> usize {
    1000
}

/// Load configuration from an explicit path or the default search order.
///
/// Order: `--config` path, `~/.orienta/config.toml`, the XDG config dir,
/// then `./config.toml`. Falls back to defaults when no file exists.
pub fn load(config_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_path {
        tracing::info!("Loading config from: {}", path.display());
        return read_config_file(path);
    }

    let default_paths = [
        dirs::home_dir().map(|h| h.join(".orienta").join("config.toml")),
        dirs::config_dir().map(|c| c.join("orienta").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            tracing::info!("Loading config from: {}", path.display());
            return read_config_file(path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

fn read_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        OrientaError::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| OrientaError::Config(format!("Failed to parse config: {e}")))?;
    config.validate()?;
    Ok(config)
}
