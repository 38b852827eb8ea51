//! Google Calendar REST backend.
//!
//! Item state travels in the event description as a marker line (see
//! [`ItemState::encode_notes`]), so items created or completed by older
//! deployments keep working.

use agendabot_core::config::CalendarConfig;
use agendabot_core::error::{AgendaError, Result};
use agendabot_core::traits::CalendarStore;
use agendabot_core::types::{CalendarItem, ItemPatch, ItemState, ItemWindow, NewItem};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

const PAGE_SIZE: u32 = 250;

/// Google Calendar v3 client bound to one calendar.
pub struct GoogleCalendar {
    client: reqwest::Client,
    base_url: String,
    calendar_id: String,
    access_token: String,
    tz: Tz,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    date_time: Option<DateTime<FixedOffset>>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Event {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    start: EventTime,
    #[serde(default)]
    end: EventTime,
}

#[derive(Debug, Deserialize)]
struct EventPage {
    #[serde(default)]
    items: Vec<Event>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

impl Event {
    fn into_item(self) -> Result<CalendarItem> {
        let window = match (self.start.date, self.start.date_time) {
            (Some(start), _) => ItemWindow::AllDay {
                start,
                end: self.end.date.unwrap_or(start + Duration::days(1)),
            },
            (None, Some(start)) => {
                let start = start.with_timezone(&Utc);
                // No end: zero length, which the digest treats as open-ended.
                let end = self.end.date_time.map_or(start, |e| e.with_timezone(&Utc));
                ItemWindow::Timed { start, end }
            }
            (None, None) => {
                return Err(AgendaError::calendar(format!("event {} has no start", self.id)));
            }
        };
        let (state, notes) = ItemState::decode_notes(self.description.as_deref().unwrap_or(""));
        Ok(CalendarItem {
            id: self.id,
            title: self.summary.unwrap_or_default(),
            notes,
            state,
            window,
        })
    }
}

fn event_time(window: &ItemWindow, tz: Tz) -> (EventTime, EventTime) {
    match window {
        ItemWindow::AllDay { start, end } => (
            EventTime { date: Some(*start), ..Default::default() },
            EventTime { date: Some(*end), ..Default::default() },
        ),
        ItemWindow::Timed { start, end } => (
            EventTime {
                date_time: Some(start.fixed_offset()),
                time_zone: Some(tz.name().to_string()),
                ..Default::default()
            },
            EventTime {
                date_time: Some(end.fixed_offset()),
                time_zone: Some(tz.name().to_string()),
                ..Default::default()
            },
        ),
    }
}

fn insert_body(item: &NewItem, tz: Tz) -> serde_json::Value {
    let (start, end) = event_time(&item.window, tz);
    serde_json::json!({
        "summary": item.title,
        "description": item.state.encode_notes(&item.notes),
        "start": start,
        "end": end,
        "reminders": { "useDefault": false, "overrides": [] },
    })
}

impl GoogleCalendar {
    pub fn new(config: &CalendarConfig, tz: Tz) -> Result<Self> {
        let access_token = config
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AgendaError::Config("Google Calendar access token not configured (GOOGLE_ACCESS_TOKEN)".into()))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .user_agent("agendabot/0.3")
            .build()
            .map_err(|e| AgendaError::Http(format!("client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            access_token,
            tz,
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(id))
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(AgendaError::Calendar(format!("{what}: Google Calendar {status}: {text}")))
    }

    async fn get_event(&self, id: &str) -> Result<Event> {
        let response = self.client
            .get(self.event_url(id))
            .bearer_auth(&self.access_token)
            .send().await
            .map_err(|e| AgendaError::Calendar(format!("get event failed: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AgendaError::ItemNotFound(id.to_string()));
        }
        Self::check(response, "get event").await?
            .json().await
            .map_err(|e| AgendaError::Calendar(format!("invalid event: {e}")))
    }
}

#[async_trait]
impl CalendarStore for GoogleCalendar {
    fn name(&self) -> &str { "google" }

    async fn list_items(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CalendarItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", start.to_rfc3339()),
                ("timeMax", end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self.client
                .get(self.events_url())
                .bearer_auth(&self.access_token)
                .query(&query)
                .send().await
                .map_err(|e| AgendaError::Calendar(format!("list events failed: {e}")))?;
            let page: EventPage = Self::check(response, "list events").await?
                .json().await
                .map_err(|e| AgendaError::Calendar(format!("invalid events page: {e}")))?;

            for event in page.items {
                if event.status.as_deref() == Some("cancelled") {
                    continue;
                }
                match event.into_item() {
                    Ok(item) => items.push(item),
                    Err(e) => tracing::warn!("⚠️ Skipping malformed event: {e}"),
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("📅 Listed {} item(s) between {start} and {end}", items.len());
        Ok(items)
    }

    async fn create_item(&self, item: NewItem) -> Result<CalendarItem> {
        let body = insert_body(&item, self.tz);
        let response = self.client
            .post(self.events_url())
            .bearer_auth(&self.access_token)
            .query(&[("sendUpdates", "none")])
            .json(&body)
            .send().await
            .map_err(|e| AgendaError::Calendar(format!("create event failed: {e}")))?;
        let event: Event = Self::check(response, "create event").await?
            .json().await
            .map_err(|e| AgendaError::Calendar(format!("invalid created event: {e}")))?;
        tracing::info!("📅 Created '{}' ({})", item.title, event.id);
        event.into_item()
    }

    async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<CalendarItem> {
        // The description carries both notes and state, so patch against the current copy.
        let mut item = self.get_event(id).await?.into_item()?;
        patch.apply_to(&mut item);

        let body = serde_json::json!({
            "summary": item.title,
            "description": item.state.encode_notes(&item.notes),
        });
        let response = self.client
            .patch(self.event_url(id))
            .bearer_auth(&self.access_token)
            .query(&[("sendUpdates", "none")])
            .json(&body)
            .send().await
            .map_err(|e| AgendaError::Calendar(format!("update event failed: {e}")))?;
        let event: Event = Self::check(response, "update event").await?
            .json().await
            .map_err(|e| AgendaError::Calendar(format!("invalid updated event: {e}")))?;
        tracing::debug!("📅 Updated {id} (state: {})", item.state);
        event.into_item()
    }

    async fn delete_item(&self, id: &str) -> Result<bool> {
        let response = self.client
            .delete(self.event_url(id))
            .bearer_auth(&self.access_token)
            .send().await
            .map_err(|e| AgendaError::Calendar(format!("delete event failed: {e}")))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(false);
        }
        Self::check(response, "delete event").await?;
        tracing::info!("🗑️ Deleted event {id}");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tz() -> Tz {
        "America/Argentina/Buenos_Aires".parse().unwrap()
    }

    #[test]
    fn test_all_day_event_mapping() {
        let raw = r#"{
            "id": "ev1",
            "summary": "Pay electricity",
            "description": "[RENEWED]\nbill is on the fridge",
            "start": {"date": "2024-01-01"},
            "end": {"date": "2024-01-02"}
        }"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        let item = event.into_item().unwrap();
        assert_eq!(item.state, ItemState::Renewed);
        assert_eq!(item.notes, "bill is on the fridge");
        assert_eq!(
            item.window,
            ItemWindow::all_day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_timed_event_mapping() {
        let raw = r#"{
            "id": "ev2",
            "summary": "Dentist",
            "start": {"dateTime": "2024-01-01T10:00:00-03:00", "timeZone": "America/Argentina/Buenos_Aires"},
            "end": {"dateTime": "2024-01-01T11:00:00-03:00"}
        }"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        let item = event.into_item().unwrap();
        assert_eq!(item.state, ItemState::Open);
        match item.window {
            ItemWindow::Timed { start, end } => {
                assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap());
                assert_eq!(end - start, Duration::hours(1));
            }
            other => panic!("expected timed window, got {other:?}"),
        }
    }

    #[test]
    fn test_timed_event_without_end_is_open_ended() {
        let raw = r#"{"id": "ev4", "summary": "Call back", "start": {"dateTime": "2024-01-01T10:00:00-03:00"}}"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        let item = event.into_item().unwrap();
        match item.window {
            ItemWindow::Timed { start, end } => assert_eq!(start, end),
            other => panic!("expected a timed window, got {other:?}"),
        }
    }

    #[test]
    fn test_event_without_start_is_rejected() {
        let raw = r#"{"id": "ev3", "start": {}, "end": {}}"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert!(event.into_item().is_err());
    }

    #[test]
    fn test_insert_body_all_day() {
        let item = NewItem::all_day("📌 Call mom", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
            .with_notes("[Renewed - not completed on 01/01/2024]");
        let body = insert_body(&item, tz());
        assert_eq!(body["start"]["date"], "2024-01-02");
        assert_eq!(body["end"]["date"], "2024-01-03");
        assert!(body["start"].get("dateTime").is_none());
        assert_eq!(body["description"], "[Renewed - not completed on 01/01/2024]");
        assert_eq!(body["reminders"]["useDefault"], false);
    }

    #[test]
    fn test_insert_body_carries_state_marker() {
        let mut item = NewItem::all_day("done already", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        item.state = ItemState::Completed;
        let body = insert_body(&item, tz());
        assert_eq!(body["description"], "[COMPLETED]");
    }

    #[test]
    fn test_urls_encode_calendar_id() {
        let config = CalendarConfig {
            calendar_id: "me@example.com".into(),
            access_token: Some("tok".into()),
            ..Default::default()
        };
        let cal = GoogleCalendar::new(&config, tz()).unwrap();
        assert_eq!(
            cal.event_url("abc"),
            "https://www.googleapis.com/calendar/v3/calendars/me%40example.com/events/abc"
        );
    }
}
