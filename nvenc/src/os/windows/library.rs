use crate::{NvEncError, Result};
use std::{
    ffi::{CString, OsStr, OsString},
    mem::MaybeUninit,
    num::NonZeroIsize,
    os::windows::ffi::{OsStrExt, OsStringExt},
};
use windows::{
    core::{GUID, PCSTR, PCWSTR, PWSTR},
    Win32::{
        Foundation::{HANDLE, HMODULE, HWND},
        Security::WinTrust::{
            WinVerifyTrustEx, WINTRUST_DATA, WINTRUST_DATA_0, WINTRUST_DATA_UICONTEXT,
            WINTRUST_FILE_INFO, WTD_CHOICE_FILE, WTD_REVOCATION_CHECK_CHAIN, WTD_REVOKE_NONE,
            WTD_STATEACTION_CLOSE, WTD_STATEACTION_VERIFY, WTD_UI_NONE,
        },
        System::{
            LibraryLoader::{
                FreeLibrary, GetProcAddress, LoadLibraryExA, LOAD_LIBRARY_SEARCH_SYSTEM32,
            },
            SystemInformation::GetSystemDirectoryW,
        },
    },
};

/// RAII wrapper for a signed .dll loaded from System32.
#[repr(transparent)]
pub struct Library(NonZeroIsize);

impl Drop for Library {
    fn drop(&mut self) {
        unsafe {
            // Deliberately ignoring failure
            let _ignored_result = FreeLibrary(self.as_inner());
        }
    }
}

impl Library {
    pub const NVENC: &'static str = "nvEncodeAPI64.dll";

    /// Load `lib_name` from System32 after checking its Authenticode signature.
    pub fn load_signed(lib_name: &str) -> Result<Self> {
        if !is_library_signed(lib_name) {
            tracing::error!(lib_name, "Refusing to load unsigned library");
            return Err(NvEncError::LibraryNotSigned);
        }

        let c_name = CString::new(lib_name).map_err(|_| NvEncError::LibraryLoadingFailed)?;
        let lib = unsafe {
            LoadLibraryExA(
                PCSTR(c_name.as_ptr() as *const u8),
                HANDLE::default(),
                LOAD_LIBRARY_SEARCH_SYSTEM32,
            )
            .map_err(|err| {
                tracing::error!(lib_name, %err, "LoadLibraryExA failed");
                NvEncError::LibraryLoadingFailed
            })?
        };
        NonZeroIsize::new(lib.0)
            .map(Library)
            .ok_or(NvEncError::LibraryLoadingFailed)
    }

    /// Extracts a function pointer from the library. `T` must be the `extern` fn type of the
    /// export.
    pub unsafe fn fn_ptr<T: Copy>(&self, fn_name: &str) -> Option<T> {
        debug_assert_eq!(
            std::mem::size_of::<T>(),
            std::mem::size_of::<unsafe extern "system" fn() -> isize>()
        );
        let c_name = CString::new(fn_name).ok()?;
        GetProcAddress(self.as_inner(), PCSTR(c_name.as_ptr() as *const u8)).map(|ptr| {
            // Fancy transmute
            (&ptr as *const _ as *const T).read()
        })
    }

    pub(crate) fn get_max_supported_version(&self) -> Result<u32> {
        type GetMaxSupportedVersion = unsafe extern "C" fn(*mut u32) -> crate::sys::NVENCSTATUS;

        let get_max_supported_version: GetMaxSupportedVersion = unsafe {
            self.fn_ptr("NvEncodeAPIGetMaxSupportedVersion")
                .ok_or(NvEncError::GetMaxSupportedVersionLoadingFailed)?
        };

        let mut version: u32 = 0;
        let status = unsafe { get_max_supported_version(&mut version) };

        match NvEncError::from_nvenc_status(status as i32) {
            Some(err) => Err(err),
            None => Ok(version),
        }
    }

    pub(crate) fn get_function_list(&self) -> Result<crate::sys::NV_ENCODE_API_FUNCTION_LIST> {
        type CreateInstance = unsafe extern "C" fn(
            *mut crate::sys::NV_ENCODE_API_FUNCTION_LIST,
        ) -> crate::sys::NVENCSTATUS;

        let create_instance: CreateInstance = unsafe {
            self.fn_ptr("NvEncodeAPICreateInstance")
                .ok_or(NvEncError::CreateInstanceLoadingFailed)?
        };

        unsafe {
            let mut fn_list: crate::sys::NV_ENCODE_API_FUNCTION_LIST =
                MaybeUninit::zeroed().assume_init();
            // The version needs to be set or the API will return an error
            fn_list.version = crate::sys::NV_ENCODE_API_FUNCTION_LIST_VER;

            match NvEncError::from_nvenc_status(create_instance(&mut fn_list) as i32) {
                Some(err) => Err(err),
                None => Ok(fn_list),
            }
        }
    }

    fn as_inner(&self) -> HMODULE {
        HMODULE(self.0.get())
    }
}

/// Checks if the library is signed. This is different from passing the
/// `LOAD_LIBRARY_REQUIRE_SIGNED_TARGET` flag to `LoadLibraryExA`.
// https://docs.microsoft.com/en-us/windows/win32/seccrypto/example-c-program--verifying-the-signature-of-a-pe-file
fn is_library_signed(filename: &str) -> bool {
    let Some(mut path) = get_system32_dir() else {
        return false;
    };
    path.push('\\');
    path.push_str(filename);

    let mut wintrust_action_generic_verify_v2 =
        GUID::from_u128(0x00AAC56B_CD44_11d0_8CC2_00C04FC295EE);

    let mut filename: Vec<u16> = OsStr::new(&path).encode_wide().collect();
    filename.push(0);

    let mut file_data = WINTRUST_FILE_INFO {
        cbStruct: std::mem::size_of::<WINTRUST_FILE_INFO>() as u32,
        pcwszFilePath: PCWSTR(filename.as_ptr()),
        hFile: HANDLE(0),
        pgKnownSubject: std::ptr::null_mut(),
    };

    let mut trust_data = WINTRUST_DATA {
        cbStruct: std::mem::size_of::<WINTRUST_DATA>() as u32,
        pPolicyCallbackData: std::ptr::null_mut(),
        pSIPClientData: std::ptr::null_mut(),
        dwUIChoice: WTD_UI_NONE,
        fdwRevocationChecks: WTD_REVOKE_NONE,
        dwUnionChoice: WTD_CHOICE_FILE,
        Anonymous: WINTRUST_DATA_0 {
            pFile: &mut file_data,
        },
        dwStateAction: WTD_STATEACTION_VERIFY,
        hWVTStateData: HANDLE(0),
        pwszURLReference: PWSTR::null(),
        dwProvFlags: WTD_REVOCATION_CHECK_CHAIN,
        dwUIContext: WINTRUST_DATA_UICONTEXT(0),
        pSignatureSettings: std::ptr::null_mut(),
    };

    let verified = unsafe {
        WinVerifyTrustEx(
            HWND::default(),
            &mut wintrust_action_generic_verify_v2,
            &mut trust_data,
        ) == 0
    };

    trust_data.dwStateAction = WTD_STATEACTION_CLOSE;
    unsafe {
        WinVerifyTrustEx(
            HWND::default(),
            &mut wintrust_action_generic_verify_v2,
            &mut trust_data,
        );
    }
    verified
}

/// C:\Windows\System32. Assumed to be more secure since write access to this directory requires
/// elevated privilege.
fn get_system32_dir() -> Option<String> {
    let mut buf = vec![0u16; 64];
    loop {
        let size = unsafe { GetSystemDirectoryW(Some(&mut buf)) } as usize;
        if size == 0 {
            tracing::error!(
                err = %windows::core::Error::from_win32(),
                "GetSystemDirectoryW failed"
            );
            return None;
        }
        // On success the count excludes the terminating null. If the buffer is too small the
        // required size including the null is returned instead.
        if size < buf.len() {
            buf.truncate(size);
            return OsString::from_wide(&buf).into_string().ok();
        }
        buf.resize(size, 0);
    }
}
