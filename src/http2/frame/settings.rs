use algorithm::buf::{Bt, BtMut};

use crate::http2::{DEFAULT_MAX_FRAME_SIZE, MAX_MAX_FRAME_SIZE};
use crate::{Http2Error, WebResult};

use super::{Flag, FrameHeader, Kind, StreamIdentifier};

#[derive(Clone, Default, Eq, PartialEq, Debug, Hash)]
pub struct Settings {
    flags: Flag,
    // Fields
    header_table_size: Option<u32>,
    enable_push: Option<u32>,
    max_concurrent_streams: Option<u32>,
    initial_window_size: Option<u32>,
    max_frame_size: Option<u32>,
    max_header_list_size: Option<u32>,
}

#[derive(Debug)]
pub enum Setting {
    HeaderTableSize(u32),
    EnablePush(u32),
    MaxConcurrentStreams(u32),
    InitialWindowSize(u32),
    MaxFrameSize(u32),
    MaxHeaderListSize(u32),
}

// ===== impl Setting =====

impl Setting {
    /// Creates a new `Setting` with the correct variant corresponding to the
    /// given setting id, based on the settings IDs defined in section
    /// 6.5.2.
    pub fn from_id(id: u16, val: u32) -> Option<Setting> {
        use self::Setting::*;

        match id {
            1 => Some(HeaderTableSize(val)),
            2 => Some(EnablePush(val)),
            3 => Some(MaxConcurrentStreams(val)),
            4 => Some(InitialWindowSize(val)),
            5 => Some(MaxFrameSize(val)),
            6 => Some(MaxHeaderListSize(val)),
            _ => None,
        }
    }

    fn parse<T: Bt>(bytes: &mut T) -> Option<Setting> {
        let id: u16 = bytes.get_u16();
        let val: u32 = bytes.get_u32();

        Setting::from_id(id, val)
    }

    fn encode<B: BtMut>(&self, dst: &mut B) -> usize {
        use self::Setting::*;

        let (kind, val) = match *self {
            HeaderTableSize(v) => (1, v),
            EnablePush(v) => (2, v),
            MaxConcurrentStreams(v) => (3, v),
            InitialWindowSize(v) => (4, v),
            MaxFrameSize(v) => (5, v),
            MaxHeaderListSize(v) => (6, v),
        };

        dst.put_u16(kind);
        dst.put_u32(val);
        6
    }
}

// ===== impl Settings =====

impl Settings {
    pub fn ack() -> Settings {
        Settings {
            flags: Flag::ack(),
            ..Settings::default()
        }
    }

    pub fn is_ack(&self) -> bool {
        self.flags.is_ack()
    }

    pub fn flags(&self) -> Flag {
        self.flags
    }

    pub fn header_table_size(&self) -> Option<u32> {
        self.header_table_size
    }

    pub fn set_header_table_size(&mut self, size: Option<u32>) {
        self.header_table_size = size;
    }

    pub fn initial_window_size(&self) -> Option<u32> {
        self.initial_window_size
    }

    pub fn set_initial_window_size(&mut self, size: Option<u32>) {
        self.initial_window_size = size;
    }

    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.max_concurrent_streams
    }

    pub fn set_max_concurrent_streams(&mut self, max: Option<u32>) {
        self.max_concurrent_streams = max;
    }

    pub fn max_frame_size(&self) -> Option<u32> {
        self.max_frame_size
    }

    pub fn set_max_frame_size(&mut self, size: Option<u32>) {
        if let Some(val) = size {
            assert!(DEFAULT_MAX_FRAME_SIZE <= val && val <= MAX_MAX_FRAME_SIZE);
        }
        self.max_frame_size = size;
    }

    pub fn max_header_list_size(&self) -> Option<u32> {
        self.max_header_list_size
    }

    pub fn set_max_header_list_size(&mut self, size: Option<u32>) {
        self.max_header_list_size = size;
    }

    pub fn is_push_enabled(&self) -> Option<bool> {
        self.enable_push.map(|val| val != 0)
    }

    pub fn set_enable_push(&mut self, enable: bool) {
        self.enable_push = Some(enable as u32);
    }

    pub fn parse<B: Bt>(header: FrameHeader, payload: &mut B) -> WebResult<Settings> {
        if header.length % 6 != 0 || payload.remaining() < header.length as usize {
            return Err(Http2Error::BadFrameSize.into());
        }
        let mut settings = Settings {
            flags: header.flag(),
            ..Settings::default()
        };
        let mut read = 0;
        while read < header.length {
            // Unknown identifiers are skipped over, RFC 7540 6.5.2.
            if let Some(setting) = Setting::parse(payload) {
                settings.apply(setting);
            }
            read += 6;
        }
        Ok(settings)
    }

    fn apply(&mut self, setting: Setting) {
        use self::Setting::*;

        match setting {
            HeaderTableSize(v) => self.header_table_size = Some(v),
            EnablePush(v) => self.enable_push = Some(v),
            MaxConcurrentStreams(v) => self.max_concurrent_streams = Some(v),
            InitialWindowSize(v) => self.initial_window_size = Some(v),
            MaxFrameSize(v) => self.max_frame_size = Some(v),
            MaxHeaderListSize(v) => self.max_header_list_size = Some(v),
        }
    }

    fn settings(&self) -> Vec<Setting> {
        use self::Setting::*;

        let mut out = Vec::new();
        if let Some(v) = self.header_table_size {
            out.push(HeaderTableSize(v));
        }
        if let Some(v) = self.enable_push {
            out.push(EnablePush(v));
        }
        if let Some(v) = self.max_concurrent_streams {
            out.push(MaxConcurrentStreams(v));
        }
        if let Some(v) = self.initial_window_size {
            out.push(InitialWindowSize(v));
        }
        if let Some(v) = self.max_frame_size {
            out.push(MaxFrameSize(v));
        }
        if let Some(v) = self.max_header_list_size {
            out.push(MaxHeaderListSize(v));
        }
        out
    }

    pub fn encode<B: BtMut>(&self, dst: &mut B) -> WebResult<usize> {
        let settings = self.settings();
        let mut head = FrameHeader::new(Kind::Settings, self.flags, StreamIdentifier::zero());
        head.length = (settings.len() * 6) as u32;

        let mut size = head.encode(dst);
        for setting in &settings {
            size += setting.encode(dst);
        }
        Ok(size)
    }
}
