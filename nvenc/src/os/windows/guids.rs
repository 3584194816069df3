use crate::{sys::GUID, Codec, EncodePreset, TuningInfo};

const NV_ENC_CODEC_H264_GUID: GUID =
    guid_from_u128(0x6BC82762_4E63_4ca4_AA85_1E50F321F6BF);

const NV_ENC_CODEC_HEVC_GUID: GUID =
    guid_from_u128(0x790CDC88_4522_4d7b_9425_BDA9975F7603);

const NV_ENC_CODEC_PROFILE_AUTOSELECT_GUID: GUID =
    guid_from_u128(0xBFD6F8E7_233C_4341_8B3E_4818523803F4);

const NV_ENC_HEVC_PROFILE_MAIN10_GUID: GUID =
    guid_from_u128(0xfa4d2b6c_3a5b_411a_8018_0a3f5e3c9be5);

const NV_ENC_PRESET_P1_GUID: GUID =
    guid_from_u128(0xfc0a8d3e_45f8_4cf8_80c7_298871590ebf);

const NV_ENC_PRESET_P2_GUID: GUID =
    guid_from_u128(0xf581cfb8_88d6_4381_93f0_df13f9c27dab);

const NV_ENC_PRESET_P3_GUID: GUID =
    guid_from_u128(0x36850110_3a07_441f_94d5_3670631f91f6);

const NV_ENC_PRESET_P4_GUID: GUID =
    guid_from_u128(0x90a7b826_df06_4862_b9d2_cd6d73a08681);

const NV_ENC_PRESET_P5_GUID: GUID =
    guid_from_u128(0x21c6e6b4_297a_4cba_998f_b6cbde72ade3);

const NV_ENC_PRESET_P6_GUID: GUID =
    guid_from_u128(0x8e75c279_6299_4ab6_8302_0b215a335cf5);

const NV_ENC_PRESET_P7_GUID: GUID =
    guid_from_u128(0x84848c12_6f71_4c13_931b_53e283f57974);
const fn guid_from_u128(uuid: u128) -> GUID {
    GUID {
        Data1: (uuid >> 96) as u32,
        Data2: (uuid >> 80 & 0xffff) as u16,
        Data3: (uuid >> 64 & 0xffff) as u16,
        Data4: (uuid as u64).to_be_bytes(),
    }
}

pub(crate) fn codec_guid(codec: Codec) -> GUID {
    match codec {
        Codec::H264 => NV_ENC_CODEC_H264_GUID,
        Codec::Hevc => NV_ENC_CODEC_HEVC_GUID,
    }
}

pub(crate) fn preset_guid(preset: EncodePreset) -> GUID {
    match preset {
        EncodePreset::P1 => NV_ENC_PRESET_P1_GUID,
        EncodePreset::P2 => NV_ENC_PRESET_P2_GUID,
        EncodePreset::P3 => NV_ENC_PRESET_P3_GUID,
        EncodePreset::P4 => NV_ENC_PRESET_P4_GUID,
        EncodePreset::P5 => NV_ENC_PRESET_P5_GUID,
        EncodePreset::P6 => NV_ENC_PRESET_P6_GUID,
        EncodePreset::P7 => NV_ENC_PRESET_P7_GUID,
    }
}

/// Let the driver pick the profile unless 10-bit HEVC needs Main10.
pub(crate) fn profile_guid(codec: Codec, ten_bit: bool) -> GUID {
    match (codec, ten_bit) {
        (Codec::Hevc, true) => NV_ENC_HEVC_PROFILE_MAIN10_GUID,
        _ => NV_ENC_CODEC_PROFILE_AUTOSELECT_GUID,
    }
}

pub(crate) fn tuning_info(tuning: TuningInfo) -> crate::sys::NV_ENC_TUNING_INFO {
    match tuning {
        TuningInfo::HighQuality => crate::sys::NV_ENC_TUNING_INFO::NV_ENC_TUNING_INFO_HIGH_QUALITY,
        TuningInfo::LowLatency => crate::sys::NV_ENC_TUNING_INFO::NV_ENC_TUNING_INFO_LOW_LATENCY,
        TuningInfo::UltraLowLatency => {
            crate::sys::NV_ENC_TUNING_INFO::NV_ENC_TUNING_INFO_ULTRA_LOW_LATENCY
        }
        TuningInfo::Lossless => crate::sys::NV_ENC_TUNING_INFO::NV_ENC_TUNING_INFO_LOSSLESS,
    }
}
