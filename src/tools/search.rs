//! Web search tool: Tavily API when a key is configured, DuckDuckGo HTML
//! scraping otherwise.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolOutcome, ToolReply};

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// Search the web and return titles, URLs and snippets.
pub struct WebSearch {
    client: reqwest::Client,
    tavily_api_key: Option<String>,
    max_results: usize,
}

impl WebSearch {
    pub fn new(tavily_api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; Turnloop/0.3)")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            tavily_api_key,
            max_results: 5,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    async fn search_tavily(&self, api_key: &str, query: &str) -> anyhow::Result<String> {
        #[derive(Deserialize)]
        struct TavilyResponse {
            #[serde(default)]
            results: Vec<TavilyResult>,
        }

        #[derive(Deserialize)]
        struct TavilyResult {
            title: String,
            url: String,
            #[serde(default)]
            content: String,
        }

        let response = self
            .client
            .post(TAVILY_API_URL)
            .json(&json!({
                "api_key": api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("search API returned {}", status);
        }

        let parsed: TavilyResponse = response.json().await?;
        if parsed.results.is_empty() {
            return Ok(format!("No results found for: {}", query));
        }

        Ok(parsed
            .results
            .iter()
            .map(|r| format!("**{}**\n{}\nURL: {}", r.title, r.content, r.url))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    async fn search_duckduckgo(&self, query: &str) -> anyhow::Result<String> {
        let encoded_query = urlencoding::encode(query);
        let url = format!("https://html.duckduckgo.com/html/?q={}", encoded_query);

        let response = self.client.get(&url).send().await?;
        let html = response.text().await?;

        let results = extract_ddg_results(&html, self.max_results);
        if results.is_empty() {
            Ok(format!("No results found for: {}", query))
        } else {
            Ok(results.join("\n\n"))
        }
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns result titles, URLs and snippets."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutcome> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;

        let text = match &self.tavily_api_key {
            Some(key) => self.search_tavily(key, query).await?,
            None => self.search_duckduckgo(query).await?,
        };

        Ok(ToolOutcome::Reply(ToolReply::Text(text)))
    }
}

/// Extract search results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str, max_results: usize) -> Vec<String> {
    let mut results = Vec::new();

    for (i, chunk) in html.split("class=\"result__body\"").enumerate().skip(1) {
        if i > max_results {
            break;
        }

        let title = chunk
            .split("class=\"result__a\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .unwrap_or("");

        let snippet = chunk
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .unwrap_or("");

        let url = chunk
            .split("class=\"result__url\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .map(|s| s.trim())
            .unwrap_or("");

        if !title.is_empty() {
            results.push(format!(
                "**{}**\n{}\nURL: {}",
                html_decode(title),
                html_decode(snippet),
                url
            ));
        }
    }

    results
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_results_from_ddg_html() {
        let html = r##"
            <div class="result__body">
              <a class="result__a" href="#">Rust Language</a>
              <a class="result__snippet" href="#">A systems language</a>
              <a class="result__url" href="#"> rust-lang.org </a>
            </div>
        "##;

        let results = extract_ddg_results(html, 5);
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("Rust Language"));
        assert!(results[0].contains("rust-lang.org"));
    }

    #[test]
    fn decodes_html_entities() {
        assert_eq!(html_decode("a &amp; b &lt;c&gt;"), "a & b <c>");
    }
}
