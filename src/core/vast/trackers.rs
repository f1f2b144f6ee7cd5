use anyhow::{Result, bail};
use derive_builder::Builder;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Exchange tracking URLs to inject into a VAST document.
///
/// Injection operates on the raw XML so creative markup the exchange
/// does not model passes through untouched. All injected URLs are
/// CDATA wrapped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, Builder)]
pub struct VastTrackers {
    /// Fired when the impression occurs
    #[builder(default)]
    pub impression: Option<String>,

    /// Fired when playback errors; may carry `[ERRORCODE]`
    #[builder(default)]
    pub error: Option<String>,

    #[builder(default)]
    pub start: Option<String>,

    #[builder(default)]
    pub first_quartile: Option<String>,

    #[builder(default)]
    pub midpoint: Option<String>,

    #[builder(default)]
    pub third_quartile: Option<String>,

    #[builder(default)]
    pub complete: Option<String>,

    #[builder(default)]
    pub pause: Option<String>,

    #[builder(default)]
    pub resume: Option<String>,

    #[builder(default)]
    pub skip: Option<String>,

    /// Appended to Linear VideoClicks
    #[builder(default)]
    pub click_tracking: Option<String>,
}

// Direct children that may precede injected Impression/Error elements
// per the VAST schema sequence
const INLINE_HEADER: &[&[u8]] = &[
    b"AdSystem",
    b"AdTitle",
    b"AdServingId",
    b"Category",
    b"Categories",
    b"Description",
    b"Advertiser",
    b"Pricing",
    b"Survey",
    b"Error",
    b"Impression",
];

const WRAPPER_HEADER: &[&[u8]] = &[
    b"AdSystem",
    b"VASTAdTagURI",
    b"AdServingId",
    b"Category",
    b"Categories",
    b"Description",
    b"Pricing",
    b"Survey",
    b"Error",
    b"Impression",
];

struct ContainerState {
    header: &'static [&'static [u8]],
    injected: bool,
    depth: usize,
}

impl ContainerState {
    fn header_allows(&self, child: &[u8]) -> bool {
        self.header.iter().any(|tag| *tag == child)
    }
}

/// Inject exchange trackers into a VAST 2.0+ document.
///
/// Impression and Error land as direct children of each InLine/Wrapper,
/// after the schema-ordered header elements. Quartile and interaction
/// events are appended inside every Linear `TrackingEvents`. Click
/// tracking is appended to `VideoClicks` (created before `</Linear>`
/// when the creative has none).
///
/// # Errors
/// Fails when the document has no InLine or Wrapper ad, or when an
/// impression/error tracker was requested but no injection point exists.
pub fn inject_vast_trackers(vast_xml: &str, trackers: &VastTrackers) -> Result<String> {
    let mut reader = Reader::from_str(vast_xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().expand_empty_elements = true;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    let mut found_container = false;
    let mut impression_done = false;
    let mut error_done = false;

    let mut container: Option<ContainerState> = None;
    let mut saw_video_clicks = false;
    let mut in_linear = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = e.name();
                let name_slice = name.as_ref();

                if name_slice == b"InLine" || name_slice == b"Wrapper" {
                    found_container = true;
                    writer.write_event(Event::Start(e.clone()))?;

                    container = Some(ContainerState {
                        header: if name_slice == b"InLine" {
                            INLINE_HEADER
                        } else {
                            WRAPPER_HEADER
                        },
                        injected: false,
                        depth: 0,
                    });
                    buf.clear();
                    continue;
                }

                if let Some(state) = container.as_mut() {
                    if state.depth == 0 && !state.injected && !state.header_allows(name_slice) {
                        write_pending_container_trackers(
                            &mut writer,
                            trackers,
                            &mut impression_done,
                            &mut error_done,
                        )?;
                        state.injected = true;
                    }
                    state.depth += 1;
                }

                match name_slice {
                    b"Linear" => {
                        in_linear = true;
                        saw_video_clicks = false;
                        writer.write_event(Event::Start(e.clone()))?;
                    }
                    b"TrackingEvents" if in_linear => {
                        writer.write_event(Event::Start(e.clone()))?;
                        inject_video_events(&mut writer, trackers)?;
                    }
                    b"VideoClicks" => {
                        saw_video_clicks = true;
                        writer.write_event(Event::Start(e.clone()))?;
                        if let Some(url) = &trackers.click_tracking {
                            write_cdata(&mut writer, "ClickTracking", url)?;
                        }
                    }
                    _ => writer.write_event(Event::Start(e.clone()))?,
                }
            }
            Event::End(ref e) => {
                let name = e.name();
                let name_slice = name.as_ref();

                if name_slice == b"InLine" || name_slice == b"Wrapper" {
                    if let Some(state) = container.as_mut() {
                        if !state.injected {
                            write_pending_container_trackers(
                                &mut writer,
                                trackers,
                                &mut impression_done,
                                &mut error_done,
                            )?;
                            state.injected = true;
                        }
                    }

                    writer.write_event(Event::End(e.clone()))?;
                    container = None;
                    buf.clear();
                    continue;
                }

                if let Some(state) = container.as_mut() {
                    if state.depth > 0 {
                        state.depth -= 1;
                    }
                }

                if name_slice == b"Linear" {
                    if !saw_video_clicks {
                        if let Some(url) = &trackers.click_tracking {
                            writer.write_event(Event::Start(BytesStart::new("VideoClicks")))?;
                            write_cdata(&mut writer, "ClickTracking", url)?;
                            writer.write_event(Event::End(BytesEnd::new("VideoClicks")))?;
                        }
                    }
                    in_linear = false;
                }

                writer.write_event(Event::End(e.clone()))?;
            }
            Event::Eof => break,
            e => writer.write_event(e)?,
        }
        buf.clear();
    }

    if !found_container {
        bail!("no InLine or Wrapper tag found in VAST document");
    }

    if trackers.impression.is_some() && !impression_done {
        bail!("impression tracker could not be injected");
    }
    if trackers.error.is_some() && !error_done {
        bail!("error tracker could not be injected");
    }

    let output = writer.into_inner().into_inner();
    String::from_utf8(output).map_err(|e| e.into())
}

fn write_pending_container_trackers<W: std::io::Write>(
    writer: &mut Writer<W>,
    trackers: &VastTrackers,
    impression_done: &mut bool,
    error_done: &mut bool,
) -> Result<()> {
    if let Some(url) = &trackers.impression {
        write_cdata(writer, "Impression", url)?;
        *impression_done = true;
    }
    if let Some(url) = &trackers.error {
        write_cdata(writer, "Error", url)?;
        *error_done = true;
    }
    Ok(())
}

fn write_cdata<W: std::io::Write>(writer: &mut Writer<W>, tag: &str, content: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::CData(BytesCData::new(content)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn inject_event<W: std::io::Write>(
    writer: &mut Writer<W>,
    event_type: &str,
    url: &Option<String>,
) -> Result<()> {
    if let Some(url) = url {
        let mut elem = BytesStart::new("Tracking");
        elem.push_attribute(("event", event_type));
        writer.write_event(Event::Start(elem))?;
        writer.write_event(Event::CData(BytesCData::new(url)))?;
        writer.write_event(Event::End(BytesEnd::new("Tracking")))?;
    }
    Ok(())
}

fn inject_video_events<W: std::io::Write>(
    writer: &mut Writer<W>,
    trackers: &VastTrackers,
) -> Result<()> {
    inject_event(writer, "start", &trackers.start)?;
    inject_event(writer, "firstQuartile", &trackers.first_quartile)?;
    inject_event(writer, "midpoint", &trackers.midpoint)?;
    inject_event(writer, "thirdQuartile", &trackers.third_quartile)?;
    inject_event(writer, "complete", &trackers.complete)?;
    inject_event(writer, "pause", &trackers.pause)?;
    inject_event(writer, "resume", &trackers.resume)?;
    inject_event(writer, "skip", &trackers.skip)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAST_INLINE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<VAST version="4.0">
  <Ad id="12345">
    <InLine>
      <AdSystem>Demand System</AdSystem>
      <AdTitle>Test Ad</AdTitle>
      <Creatives>
        <Creative>
          <Linear>
            <Duration>00:00:15</Duration>
            <TrackingEvents>
            </TrackingEvents>
            <MediaFiles>
              <MediaFile>https://cdn.example/video.mp4</MediaFile>
            </MediaFiles>
          </Linear>
        </Creative>
      </Creatives>
    </InLine>
  </Ad>
</VAST>"#;

    const VAST_WRAPPER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<VAST version="4.0">
  <Ad id="wrapper123">
    <Wrapper>
      <AdSystem>Wrapper System</AdSystem>
      <VASTAdTagURI>https://dsp.example/vast.xml</VASTAdTagURI>
      <Creatives>
        <Creative>
          <Linear>
            <TrackingEvents>
            </TrackingEvents>
          </Linear>
        </Creative>
      </Creatives>
    </Wrapper>
  </Ad>
</VAST>"#;

    #[test]
    fn test_inject_impression_inline_after_header() {
        let trackers = VastTrackersBuilder::default()
            .impression(Some("https://ev.example/imp?id=123".to_string()))
            .build()
            .unwrap();

        let result = inject_vast_trackers(VAST_INLINE, &trackers).unwrap();

        assert!(result.contains("<Impression><![CDATA[https://ev.example/imp?id=123]]></Impression>"));

        let title_pos = result.find("<AdTitle>").unwrap();
        let imp_pos = result.find("<Impression>").unwrap();
        let creatives_pos = result.find("<Creatives>").unwrap();
        assert!(title_pos < imp_pos);
        assert!(imp_pos < creatives_pos);
    }

    #[test]
    fn test_inject_impression_wrapper_after_tag_uri() {
        let trackers = VastTrackersBuilder::default()
            .impression(Some("https://ev.example/imp?id=456".to_string()))
            .build()
            .unwrap();

        let result = inject_vast_trackers(VAST_WRAPPER, &trackers).unwrap();

        let uri_pos = result.find("<VASTAdTagURI>").unwrap();
        let imp_pos = result.find("<Impression>").unwrap();
        assert!(uri_pos < imp_pos);
    }

    #[test]
    fn test_inject_quartile_events() {
        let trackers = VastTrackersBuilder::default()
            .start(Some("https://ev.example/e?t=start".to_string()))
            .first_quartile(Some("https://ev.example/e?t=q1".to_string()))
            .midpoint(Some("https://ev.example/e?t=mid".to_string()))
            .third_quartile(Some("https://ev.example/e?t=q3".to_string()))
            .complete(Some("https://ev.example/e?t=done".to_string()))
            .build()
            .unwrap();

        let result = inject_vast_trackers(VAST_INLINE, &trackers).unwrap();

        for event in ["start", "firstQuartile", "midpoint", "thirdQuartile", "complete"] {
            assert!(
                result.contains(&format!(r#"<Tracking event="{event}">"#)),
                "missing {event}"
            );
        }
    }

    #[test]
    fn test_click_tracking_creates_video_clicks() {
        let trackers = VastTrackersBuilder::default()
            .click_tracking(Some("https://ev.example/click".to_string()))
            .build()
            .unwrap();

        let result = inject_vast_trackers(VAST_INLINE, &trackers).unwrap();

        assert!(result.contains(
            "<VideoClicks><ClickTracking><![CDATA[https://ev.example/click]]></ClickTracking></VideoClicks>"
        ));
    }

    #[test]
    fn test_error_tracker_keeps_macro() {
        let trackers = VastTrackersBuilder::default()
            .error(Some("https://ev.example/err?code=[ERRORCODE]".to_string()))
            .build()
            .unwrap();

        let result = inject_vast_trackers(VAST_INLINE, &trackers).unwrap();

        assert!(result.contains("<![CDATA[https://ev.example/err?code=[ERRORCODE]]]>"));
    }

    #[test]
    fn test_url_with_ampersands_not_entity_encoded() {
        let url = "https://ev.example/imp?id=123&pub=456&fmt=video";
        let trackers = VastTrackersBuilder::default()
            .impression(Some(url.to_string()))
            .build()
            .unwrap();

        let result = inject_vast_trackers(VAST_INLINE, &trackers).unwrap();

        assert!(result.contains(&format!("<![CDATA[{}]]>", url)));
        assert!(!result.contains("id=123&amp;pub"));
    }

    #[test]
    fn test_empty_trackers_passthrough() {
        let trackers = VastTrackersBuilder::default().build().unwrap();
        let result = inject_vast_trackers(VAST_INLINE, &trackers).unwrap();

        assert!(result.contains("<InLine>"));
        assert!(!result.contains("<Impression>"));
    }

    #[test]
    fn test_no_container_is_error() {
        let invalid = r#"<VAST version="4.0"><Ad id="1"><Other/></Ad></VAST>"#;
        let trackers = VastTrackersBuilder::default()
            .impression(Some("https://ev.example/imp".to_string()))
            .build()
            .unwrap();

        let result = inject_vast_trackers(invalid, &trackers);
        assert!(result.is_err());
    }

    #[test]
    fn test_existing_trackers_kept() {
        let vast = r#"<VAST version="4.0"><Ad id="1"><InLine><AdSystem>s</AdSystem><Impression><![CDATA[https://keep.example/imp]]></Impression><Creatives><Creative><Linear><TrackingEvents><Tracking event="start"><![CDATA[https://keep.example/start]]></Tracking></TrackingEvents></Linear></Creative></Creatives></InLine></Ad></VAST>"#;

        let trackers = VastTrackersBuilder::default()
            .impression(Some("https://ev.example/imp".to_string()))
            .start(Some("https://ev.example/start".to_string()))
            .build()
            .unwrap();

        let result = inject_vast_trackers(vast, &trackers).unwrap();

        assert!(result.contains("https://keep.example/imp"));
        assert!(result.contains("https://keep.example/start"));
        assert!(result.contains("https://ev.example/imp"));
        assert!(result.contains("https://ev.example/start"));
        assert_eq!(result.matches("<Impression>").count(), 2);
    }

    #[test]
    fn test_output_remains_parseable() {
        let trackers = VastTrackersBuilder::default()
            .impression(Some("https://ev.example/imp".to_string()))
            .start(Some("https://ev.example/start".to_string()))
            .click_tracking(Some("https://ev.example/click".to_string()))
            .build()
            .unwrap();

        let result = inject_vast_trackers(VAST_INLINE, &trackers).unwrap();

        let mut reader = Reader::from_str(&result);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("XML parse error: {}", e),
            }
            buf.clear();
        }
    }
}
