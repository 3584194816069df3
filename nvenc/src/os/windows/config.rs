use super::{guids, raw_encoder::RawEncoder};
use crate::{Codec, RateControl, Result, SessionConfig};
use std::mem::MaybeUninit;

/// `NV_ENC_INITIALIZE_PARAMS` together with the `NV_ENC_CONFIG` it points to.
pub(crate) struct InitParams {
    params: crate::sys::NV_ENC_INITIALIZE_PARAMS,
    encode_config: Box<crate::sys::NV_ENC_CONFIG>,
}

impl InitParams {
    pub(crate) fn new(raw_encoder: &RawEncoder, config: &SessionConfig) -> Result<Self> {
        let encode_config = build_encode_config(raw_encoder, config)?;

        let mut params: crate::sys::NV_ENC_INITIALIZE_PARAMS =
            unsafe { MaybeUninit::zeroed().assume_init() };
        params.version = crate::sys::NV_ENC_INITIALIZE_PARAMS_VER;
        params.encodeGUID = guids::codec_guid(config.codec);
        params.presetGUID = guids::preset_guid(config.preset);
        params.tuningInfo = guids::tuning_info(config.tuning);
        params.encodeWidth = config.width;
        params.encodeHeight = config.height;
        params.maxEncodeWidth = config.width;
        params.maxEncodeHeight = config.height;

        let (dar_width, dar_height) = crate::util::display_aspect_ratio(config.width, config.height);
        params.darWidth = dar_width;
        params.darHeight = dar_height;

        params.frameRateNum = config.frame_rate_num;
        params.frameRateDen = config.frame_rate_den;
        params.enablePTD = 1;
        // Completion is awaited by the blocking bitstream lock
        params.enableEncodeAsync = 0;

        Ok(InitParams {
            params,
            encode_config,
        })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut crate::sys::NV_ENC_INITIALIZE_PARAMS {
        self.params.encodeConfig = &mut *self.encode_config;
        &mut self.params
    }
}

fn build_encode_config(
    raw_encoder: &RawEncoder,
    config: &SessionConfig,
) -> Result<Box<crate::sys::NV_ENC_CONFIG>> {
    let mut preset_config: crate::sys::NV_ENC_PRESET_CONFIG =
        unsafe { MaybeUninit::zeroed().assume_init() };
    preset_config.version = crate::sys::NV_ENC_PRESET_CONFIG_VER;
    preset_config.presetCfg.version = crate::sys::NV_ENC_CONFIG_VER;

    unsafe {
        raw_encoder.get_encode_preset_config_ex(
            guids::codec_guid(config.codec),
            guids::preset_guid(config.preset),
            guids::tuning_info(config.tuning),
            &mut preset_config,
        )?;
    }

    let mut encode_config = Box::new(preset_config.presetCfg);
    let ten_bit = config.buffer_format.is_10_bit();
    encode_config.profileGUID = guids::profile_guid(config.codec, ten_bit);

    let gop_length = config
        .gop_length
        .unwrap_or(crate::sys::NVENC_INFINITE_GOPLENGTH);
    encode_config.gopLength = gop_length;
    encode_config.frameIntervalP = config.frame_interval_p.max(1).min(gop_length) as i32;

    let rc_params = &mut encode_config.rcParams;
    rc_params.lookaheadDepth = config.lookahead_depth as u16;
    rc_params.set_enableLookahead((config.lookahead_depth > 0) as u32);
    match config.rate_control {
        RateControl::ConstQp { qp } => {
            rc_params.rateControlMode = crate::sys::NV_ENC_PARAMS_RC_MODE::NV_ENC_PARAMS_RC_CONSTQP;
            rc_params.constQP = crate::sys::NV_ENC_QP {
                qpInterP: qp as u32,
                qpInterB: qp as u32,
                qpIntra: qp as u32,
            };
        }
        RateControl::Cbr { bitrate } => {
            rc_params.rateControlMode = crate::sys::NV_ENC_PARAMS_RC_MODE::NV_ENC_PARAMS_RC_CBR;
            rc_params.averageBitRate = bitrate;
            rc_params.maxBitRate = bitrate;

            // Single frame VBV keeps every picture close to the average size
            let fps = (config.frame_rate_num / config.frame_rate_den.max(1)).max(1);
            rc_params.vbvBufferSize = bitrate / fps;
            rc_params.vbvInitialDelay = bitrate / fps;
        }
    }

    let codec_config = &mut encode_config.encodeCodecConfig;
    match config.codec {
        Codec::H264 => {
            let h264_config = unsafe { &mut codec_config.h264Config };
            h264_config.idrPeriod = gop_length;
            // Settings for optimal performance when using
            // `IDXGIOutputDuplication::AcquireNextFrame`
            h264_config.set_enableFillerDataInsertion(0);
            h264_config.set_outputBufferingPeriodSEI(0);
            h264_config.set_outputPictureTimingSEI(0);
            h264_config.set_outputAUD(0);
            h264_config.set_outputFramePackingSEI(0);
            h264_config.set_outputRecoveryPointSEI(0);
            h264_config.set_enableScalabilityInfoSEI(0);
            h264_config.set_disableSVCPrefixNalu(1);
        }
        Codec::Hevc => {
            let hevc_config = unsafe { &mut codec_config.hevcConfig };
            hevc_config.idrPeriod = gop_length;
            hevc_config.set_pixelBitDepthMinus8(if ten_bit { 2 } else { 0 });
            hevc_config.set_enableFillerDataInsertion(0);
            hevc_config.set_outputBufferingPeriodSEI(0);
            hevc_config.set_outputPictureTimingSEI(0);
            hevc_config.set_outputAUD(0);
        }
    }

    Ok(encode_config)
}
