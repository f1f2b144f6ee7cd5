use anyhow::{Result, anyhow};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// A parsed VAST document. Covers the linear subset the exchange
/// produces and consumes: InLine and Wrapper ads, impressions, error
/// URI, linear creatives with tracking events, video clicks and media
/// files. Parse and marshal are lossless for this subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vast {
    pub version: String,
    pub ads: Vec<VastAd>,
    /// Document-level error URI, only present on error responses
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VastAd {
    pub id: String,
    pub kind: VastAdKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VastAdKind {
    InLine(InLineAd),
    Wrapper(WrapperAd),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InLineAd {
    pub ad_system: String,
    pub ad_title: String,
    pub impressions: Vec<String>,
    pub error: Option<String>,
    pub creatives: Vec<Creative>,
}

/// Wrapper ad indirecting to another VAST document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrapperAd {
    pub ad_system: String,
    pub ad_tag_uri: String,
    pub impressions: Vec<String>,
    pub error: Option<String>,
    pub creatives: Vec<Creative>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Creative {
    pub id: String,
    pub linear: Option<Linear>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Linear {
    /// Duration in seconds
    pub duration: f32,
    pub skipoffset: Option<String>,
    pub media_files: Vec<MediaFile>,
    pub tracking_events: Vec<TrackingEvent>,
    pub click_through: Option<String>,
    pub click_trackings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaFile {
    pub url: String,
    pub delivery: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub bitrate: Option<u32>,
    pub codec: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingEvent {
    pub event: String,
    pub url: String,
}

impl Vast {
    pub fn is_empty(&self) -> bool {
        self.ads.is_empty()
    }

    /// Parse a VAST 2.0-4.2 document, keeping the linear subset
    pub fn parse(xml: &str) -> Result<Vast> {
        let mut reader = Reader::from_str(xml);

        let mut vast = Vast::default();
        let mut in_document = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) if e.name().as_ref() == b"VAST" => {
                    vast.version = get_attr(e, "version").unwrap_or_default();
                    in_document = true;
                }
                Ok(Event::Start(ref e)) if e.name().as_ref() == b"Ad" => {
                    let id = get_attr(e, "id").unwrap_or_default();
                    if let Some(ad) = parse_ad(&mut reader, id)? {
                        vast.ads.push(ad);
                    }
                }
                Ok(Event::Start(ref e)) if e.name().as_ref() == b"Error" => {
                    vast.error = Some(read_text(&mut reader, "Error")?);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(anyhow!("VAST parse error: {}", e)),
                _ => {}
            }
        }

        if !in_document {
            return Err(anyhow!("no VAST root element"));
        }

        Ok(vast)
    }

    /// Marshal back to XML. All URLs are CDATA wrapped.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer.write_event(Event::Decl(quick_xml::events::BytesDecl::new(
            "1.0",
            Some("UTF-8"),
            None,
        )))?;

        let mut root = BytesStart::new("VAST");
        root.push_attribute(("version", self.version.as_str()));
        writer.write_event(Event::Start(root))?;

        if let Some(error) = &self.error {
            write_cdata_element(&mut writer, "Error", error)?;
        }

        for ad in &self.ads {
            let mut ad_start = BytesStart::new("Ad");
            if !ad.id.is_empty() {
                ad_start.push_attribute(("id", ad.id.as_str()));
            }
            writer.write_event(Event::Start(ad_start))?;

            match &ad.kind {
                VastAdKind::InLine(inline) => write_inline(&mut writer, inline)?,
                VastAdKind::Wrapper(wrapper) => write_wrapper(&mut writer, wrapper)?,
            }

            writer.write_event(Event::End(BytesEnd::new("Ad")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("VAST")))?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| e.into())
    }
}

fn write_inline<W: std::io::Write>(writer: &mut Writer<W>, ad: &InLineAd) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("InLine")))?;

    write_text_element(writer, "AdSystem", &ad.ad_system)?;
    write_text_element(writer, "AdTitle", &ad.ad_title)?;

    if let Some(error) = &ad.error {
        write_cdata_element(writer, "Error", error)?;
    }

    for impression in &ad.impressions {
        write_cdata_element(writer, "Impression", impression)?;
    }

    write_creatives(writer, &ad.creatives)?;

    writer.write_event(Event::End(BytesEnd::new("InLine")))?;
    Ok(())
}

fn write_wrapper<W: std::io::Write>(writer: &mut Writer<W>, ad: &WrapperAd) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("Wrapper")))?;

    write_text_element(writer, "AdSystem", &ad.ad_system)?;
    write_cdata_element(writer, "VASTAdTagURI", &ad.ad_tag_uri)?;

    if let Some(error) = &ad.error {
        write_cdata_element(writer, "Error", error)?;
    }

    for impression in &ad.impressions {
        write_cdata_element(writer, "Impression", impression)?;
    }

    write_creatives(writer, &ad.creatives)?;

    writer.write_event(Event::End(BytesEnd::new("Wrapper")))?;
    Ok(())
}

fn write_creatives<W: std::io::Write>(writer: &mut Writer<W>, creatives: &[Creative]) -> Result<()> {
    if creatives.is_empty() {
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new("Creatives")))?;

    for creative in creatives {
        let mut start = BytesStart::new("Creative");
        if !creative.id.is_empty() {
            start.push_attribute(("id", creative.id.as_str()));
        }
        writer.write_event(Event::Start(start))?;

        if let Some(linear) = &creative.linear {
            write_linear(writer, linear)?;
        }

        writer.write_event(Event::End(BytesEnd::new("Creative")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Creatives")))?;
    Ok(())
}

fn write_linear<W: std::io::Write>(writer: &mut Writer<W>, linear: &Linear) -> Result<()> {
    let mut start = BytesStart::new("Linear");
    if let Some(skipoffset) = &linear.skipoffset {
        start.push_attribute(("skipoffset", skipoffset.as_str()));
    }
    writer.write_event(Event::Start(start))?;

    write_text_element(writer, "Duration", &format_duration(linear.duration))?;

    writer.write_event(Event::Start(BytesStart::new("TrackingEvents")))?;
    for event in &linear.tracking_events {
        let mut tracking = BytesStart::new("Tracking");
        tracking.push_attribute(("event", event.event.as_str()));
        writer.write_event(Event::Start(tracking))?;
        writer.write_event(Event::CData(BytesCData::new(event.url.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("Tracking")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("TrackingEvents")))?;

    if linear.click_through.is_some() || !linear.click_trackings.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("VideoClicks")))?;
        if let Some(click_through) = &linear.click_through {
            write_cdata_element(writer, "ClickThrough", click_through)?;
        }
        for click in &linear.click_trackings {
            write_cdata_element(writer, "ClickTracking", click)?;
        }
        writer.write_event(Event::End(BytesEnd::new("VideoClicks")))?;
    }

    if !linear.media_files.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("MediaFiles")))?;
        for media in &linear.media_files {
            let mut start = BytesStart::new("MediaFile");
            start.push_attribute(("delivery", media.delivery.as_str()));
            start.push_attribute(("type", media.mime_type.as_str()));
            start.push_attribute(("width", media.width.to_string().as_str()));
            start.push_attribute(("height", media.height.to_string().as_str()));
            if let Some(bitrate) = media.bitrate {
                start.push_attribute(("bitrate", bitrate.to_string().as_str()));
            }
            if let Some(codec) = &media.codec {
                start.push_attribute(("codec", codec.as_str()));
            }
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::CData(BytesCData::new(media.url.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new("MediaFile")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("MediaFiles")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Linear")))?;
    Ok(())
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    content: &str,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(content)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_cdata_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    content: &str,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::CData(BytesCData::new(content)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn parse_ad(reader: &mut Reader<&[u8]>, id: String) -> Result<Option<VastAd>> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"InLine" => {
                let inline = parse_inline(reader)?;
                return Ok(Some(VastAd {
                    id,
                    kind: VastAdKind::InLine(inline),
                }));
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Wrapper" => {
                let wrapper = parse_wrapper(reader)?;
                return Ok(Some(VastAd {
                    id,
                    kind: VastAdKind::Wrapper(wrapper),
                }));
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Ad" => return Ok(None),
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(anyhow!("VAST parse error in Ad: {}", e)),
            _ => {}
        }
    }
}

fn parse_inline(reader: &mut Reader<&[u8]>) -> Result<InLineAd> {
    let mut ad = InLineAd::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"AdSystem" => ad.ad_system = read_text(reader, "AdSystem")?,
                b"AdTitle" => ad.ad_title = read_text(reader, "AdTitle")?,
                b"Impression" => {
                    let url = read_text(reader, "Impression")?;
                    if !url.is_empty() {
                        ad.impressions.push(url);
                    }
                }
                b"Error" => ad.error = Some(read_text(reader, "Error")?),
                b"Creatives" => ad.creatives = parse_creatives(reader)?,
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"InLine" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("VAST parse error in InLine: {}", e)),
            _ => {}
        }
    }

    Ok(ad)
}

fn parse_wrapper(reader: &mut Reader<&[u8]>) -> Result<WrapperAd> {
    let mut ad = WrapperAd::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"AdSystem" => ad.ad_system = read_text(reader, "AdSystem")?,
                b"VASTAdTagURI" => ad.ad_tag_uri = read_text(reader, "VASTAdTagURI")?,
                b"Impression" => {
                    let url = read_text(reader, "Impression")?;
                    if !url.is_empty() {
                        ad.impressions.push(url);
                    }
                }
                b"Error" => ad.error = Some(read_text(reader, "Error")?),
                b"Creatives" => ad.creatives = parse_creatives(reader)?,
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Wrapper" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("VAST parse error in Wrapper: {}", e)),
            _ => {}
        }
    }

    Ok(ad)
}

fn parse_creatives(reader: &mut Reader<&[u8]>) -> Result<Vec<Creative>> {
    let mut creatives = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Creative" => {
                let id = get_attr(e, "id").unwrap_or_default();
                creatives.push(parse_creative(reader, id)?);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Creatives" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("VAST parse error in Creatives: {}", e)),
            _ => {}
        }
    }

    Ok(creatives)
}

fn parse_creative(reader: &mut Reader<&[u8]>, id: String) -> Result<Creative> {
    let mut linear = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Linear" => {
                let skipoffset = get_attr(e, "skipoffset");
                linear = Some(parse_linear(reader, skipoffset)?);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Creative" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("VAST parse error in Creative: {}", e)),
            _ => {}
        }
    }

    Ok(Creative { id, linear })
}

fn parse_linear(reader: &mut Reader<&[u8]>, skipoffset: Option<String>) -> Result<Linear> {
    let mut linear = Linear {
        skipoffset,
        ..Default::default()
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Duration" => {
                    let raw = read_text(reader, "Duration")?;
                    linear.duration = parse_duration(&raw);
                }
                b"MediaFiles" => linear.media_files = parse_media_files(reader)?,
                b"TrackingEvents" => linear.tracking_events = parse_tracking_events(reader)?,
                b"VideoClicks" => {
                    let (through, trackings) = parse_video_clicks(reader)?;
                    linear.click_through = through;
                    linear.click_trackings = trackings;
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Linear" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("VAST parse error in Linear: {}", e)),
            _ => {}
        }
    }

    Ok(linear)
}

fn parse_media_files(reader: &mut Reader<&[u8]>) -> Result<Vec<MediaFile>> {
    let mut files = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"MediaFile" => {
                let delivery = get_attr(e, "delivery").unwrap_or_default();
                let mime_type = get_attr(e, "type").unwrap_or_default();
                let width = get_attr(e, "width")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                let height = get_attr(e, "height")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                let bitrate = get_attr(e, "bitrate").and_then(|s| s.parse().ok());
                let codec = get_attr(e, "codec");

                let url = read_text(reader, "MediaFile")?;

                files.push(MediaFile {
                    url,
                    delivery,
                    mime_type,
                    width,
                    height,
                    bitrate,
                    codec,
                });
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"MediaFiles" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("VAST parse error in MediaFiles: {}", e)),
            _ => {}
        }
    }

    Ok(files)
}

fn parse_tracking_events(reader: &mut Reader<&[u8]>) -> Result<Vec<TrackingEvent>> {
    let mut events = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Tracking" => {
                let event = get_attr(e, "event").unwrap_or_default();
                let url = read_text(reader, "Tracking")?;
                events.push(TrackingEvent { event, url });
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"TrackingEvents" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("VAST parse error in TrackingEvents: {}", e)),
            _ => {}
        }
    }

    Ok(events)
}

fn parse_video_clicks(reader: &mut Reader<&[u8]>) -> Result<(Option<String>, Vec<String>)> {
    let mut through = None;
    let mut trackings = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"ClickThrough" => {
                through = Some(read_text(reader, "ClickThrough")?);
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"ClickTracking" => {
                trackings.push(read_text(reader, "ClickTracking")?);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"VideoClicks" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("VAST parse error in VideoClicks: {}", e)),
            _ => {}
        }
    }

    Ok((through, trackings))
}

/// Parse "HH:MM:SS" or "HH:MM:SS.mmm" to seconds
pub fn parse_duration(duration: &str) -> f32 {
    let parts: Vec<&str> = duration.trim().split(':').collect();
    match parts.len() {
        3 => {
            let hours: f32 = parts[0].parse().unwrap_or(0.0);
            let minutes: f32 = parts[1].parse().unwrap_or(0.0);
            let seconds: f32 = parts[2].parse().unwrap_or(0.0);
            hours * 3600.0 + minutes * 60.0 + seconds
        }
        _ => 0.0,
    }
}

/// Format seconds as "HH:MM:SS" (millis kept when fractional)
pub fn format_duration(seconds: f32) -> String {
    let whole = seconds.max(0.0) as u64;
    let hours = whole / 3600;
    let minutes = (whole / 60) % 60;
    let secs = whole % 60;
    let fract = seconds.max(0.0).fract();

    if fract > 0.0005 {
        format!(
            "{:02}:{:02}:{:06.3}",
            hours,
            minutes,
            secs as f32 + fract
        )
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}

fn read_text(reader: &mut Reader<&[u8]>, end_tag: &str) -> Result<String> {
    let mut text = String::new();
    let end_tag_bytes = end_tag.as_bytes();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                text.push_str(&e.decode().unwrap_or_default());
            }
            Ok(Event::CData(e)) => {
                text.push_str(std::str::from_utf8(&e).unwrap_or_default());
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == end_tag_bytes => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("VAST read error: {}", e)),
            _ => {}
        }
    }

    Ok(text.trim().to_string())
}

fn get_attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name.as_bytes())
        .and_then(|a| String::from_utf8(a.value.to_vec()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inline() -> Vast {
        Vast {
            version: "4.2".into(),
            error: None,
            ads: vec![VastAd {
                id: "ad-1".into(),
                kind: VastAdKind::InLine(InLineAd {
                    ad_system: "vex".into(),
                    ad_title: "Sample".into(),
                    impressions: vec!["https://x.example/imp?a=1&b=2".into()],
                    error: Some("https://x.example/err?code=[ERRORCODE]".into()),
                    creatives: vec![Creative {
                        id: "c-1".into(),
                        linear: Some(Linear {
                            duration: 15.0,
                            skipoffset: Some("00:00:05".into()),
                            media_files: vec![MediaFile {
                                url: "https://cdn.example/ad.mp4".into(),
                                delivery: "progressive".into(),
                                mime_type: "video/mp4".into(),
                                width: 1920,
                                height: 1080,
                                bitrate: Some(2500),
                                codec: None,
                            }],
                            tracking_events: vec![
                                TrackingEvent {
                                    event: "start".into(),
                                    url: "https://x.example/ev?e=start".into(),
                                },
                                TrackingEvent {
                                    event: "complete".into(),
                                    url: "https://x.example/ev?e=complete".into(),
                                },
                            ],
                            click_through: Some("https://adv.example/landing".into()),
                            click_trackings: vec!["https://x.example/click".into()],
                        }),
                    }],
                }),
            }],
        }
    }

    #[test]
    fn test_marshal_parse_roundtrip_inline() {
        let original = sample_inline();
        let xml = original.to_xml().unwrap();
        let parsed = Vast::parse(&xml).unwrap();

        assert_eq!(parsed, original);
    }

    #[test]
    fn test_marshal_parse_roundtrip_wrapper() {
        let original = Vast {
            version: "4.0".into(),
            error: None,
            ads: vec![VastAd {
                id: "w-1".into(),
                kind: VastAdKind::Wrapper(WrapperAd {
                    ad_system: "vex".into(),
                    ad_tag_uri: "https://dsp.example/vast?price=${AUCTION_PRICE}".into(),
                    impressions: vec!["https://x.example/imp".into()],
                    error: None,
                    creatives: vec![],
                }),
            }],
        };

        let xml = original.to_xml().unwrap();
        let parsed = Vast::parse(&xml).unwrap();

        assert_eq!(parsed, original);
        assert!(xml.contains("${AUCTION_PRICE}"));
    }

    #[test]
    fn test_urls_cdata_wrapped_not_entity_encoded() {
        let xml = sample_inline().to_xml().unwrap();

        assert!(xml.contains("<![CDATA[https://x.example/imp?a=1&b=2]]>"));
        assert!(!xml.contains("a=1&amp;b=2"));
    }

    #[test]
    fn test_parse_legacy_versions() {
        for version in ["2.0", "3.0", "4.0", "4.1", "4.2"] {
            let xml = format!(
                r#"<VAST version="{version}"><Ad id="a"><InLine><AdSystem>s</AdSystem><AdTitle>t</AdTitle></InLine></Ad></VAST>"#
            );
            let parsed = Vast::parse(&xml).unwrap();
            assert_eq!(parsed.version, version);
            assert_eq!(parsed.ads.len(), 1);
        }
    }

    #[test]
    fn test_parse_empty_document() {
        let parsed = Vast::parse(r#"<VAST version="4.2"></VAST>"#).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_vast() {
        assert!(Vast::parse("<html></html>").is_err());
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_duration(15.0), "00:00:15");
        assert_eq!(format_duration(90.0), "00:01:30");
        assert_eq!(format_duration(3661.0), "01:01:01");
        assert_eq!(parse_duration("00:00:15"), 15.0);
        assert_eq!(parse_duration("01:01:01"), 3661.0);
        assert_eq!(parse_duration("bogus"), 0.0);
    }
}
