//! Analytics visualizations fed by paged REST data sources.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::driver::ElementRef;
use crate::error::{E2eError, E2eResult};

/// Chart animations hold up the script that fills in the page dump.
const DUMP_WAIT: Duration = Duration::from_secs(10);

const DUMP_POLL: Duration = Duration::from_millis(100);

page_object!(
    /// An analytics sub tab
    AnalyticsPage
);

impl AnalyticsPage {
    pub async fn wait_until_logs_not_empty(&self, data_source: &str) -> E2eResult<&Self> {
        let this = self;
        self.session()
            .wait_until(
                &format!("logs of {}", data_source),
                move || async move { Ok(!this.get_data_source_logs(data_source).await?.is_empty()) },
            )
            .await?;
        Ok(self)
    }

    /// Page of `data_source` that the page scripts last fetched.
    pub async fn get_data_page_number(&self, data_source: &str) -> E2eResult<i64> {
        let dump = ElementRef::id("model_visualizations_dump");
        let deadline = Instant::now() + DUMP_WAIT;
        let mut text = self.text_of(&dump).await?;
        while text.is_empty() && Instant::now() < deadline {
            sleep(DUMP_POLL).await;
            text = self.text_of(&dump).await?;
        }

        parse_page_numbers(&text)?
            .remove(data_source)
            .ok_or_else(|| {
                E2eError::AssertionFailed(format!("no page number for {} in {:?}", data_source, text))
            })
    }

    pub async fn get_displayed_page_number(&self, data_source: &str) -> E2eResult<String> {
        self.text_of(&ElementRef::id(format!("gcb_rest_source_page_number_{}", data_source)))
            .await
    }

    pub async fn get_data_source_logs(&self, data_source: &str) -> E2eResult<String> {
        self.text_of(&ElementRef::id(format!("gcb_log_rest_source_{}", data_source)))
            .await
    }

    pub async fn get_page_level_logs(&self) -> E2eResult<String> {
        self.text_of(&ElementRef::id("gcb_rest_source_errors")).await
    }

    /// Press a paging button such as "plusone" or "minusone".
    pub async fn click_page_request(&self, data_source: &str, button: &str) -> E2eResult<&Self> {
        let id = format!("gcb_rest_source_page_request_{}_{}", button, data_source);
        let button = self.find_element_by_id(&id).await?;
        self.click(&button).await?;
        Ok(self)
    }

    pub async fn buttons_present(&self, data_source: &str) -> E2eResult<bool> {
        self.driver()
            .exists(&ElementRef::id(format!("gcb_rest_source_request_zero_{}", data_source)))
            .await
    }

    pub async fn set_chunk_size(&self, data_source: &str, chunk_size: usize) -> E2eResult<&Self> {
        let field = self
            .find_element_by_id(&format!("gcb_rest_source_chunk_size_{}", data_source))
            .await?;
        self.fill(&field, &chunk_size.to_string()).await?;
        Ok(self)
    }

    pub async fn answers_pie_chart_present(&self) -> E2eResult<bool> {
        let chart = self.find_element_by_id("answers_pie_chart").await?;
        let svgs = self.driver().count(&chart.child_css("svg")).await?;
        Ok(svgs > 0)
    }
}

/// Parse the `name=number` lines of the visualizations dump.
pub(crate) fn parse_page_numbers(text: &str) -> E2eResult<HashMap<String, i64>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let malformed = || E2eError::AssertionFailed(format!("malformed page dump line {:?}", line));
            let (name, value) = line.split_once('=').ok_or_else(malformed)?;
            let value = value.trim().parse().map_err(|_| malformed())?;
            Ok((name.trim().to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_dump_lines() {
        let numbers = parse_page_numbers("exams=0\nlabels=3\n").unwrap();
        assert_eq!(numbers.get("labels"), Some(&3));
        assert_eq!(numbers.len(), 2);

        let err = parse_page_numbers("exams=zero").unwrap_err();
        assert!(err.to_string().contains("exams=zero"));
        assert!(parse_page_numbers("exams").is_err());
    }
}
